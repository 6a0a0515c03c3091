//! Pure data types for error handling across the control plane, with no dependency
//! on how a particular component talks to its backend.
//!
//! - RFC 9457 Problem Details ([`Problem`])
//! - Error catalog support ([`catalog::ErrDef`])
//! - The shared [`CoreError`] taxonomy every component reports through

pub mod catalog;
mod core_error;
pub mod problem;

pub use catalog::ErrDef;
pub use core_error::CoreError;
pub use problem::{APPLICATION_PROBLEM_JSON, Problem, ValidationError, ValidationViolation};

/// Attach request-scoped context to a Problem right before it leaves the process.
pub fn finalize(mut p: Problem, instance: &str, trace_id: Option<String>) -> Problem {
    p = p.with_instance(instance);
    if let Some(tid) = trace_id {
        p = p.with_trace_id(tid);
    }
    p
}
