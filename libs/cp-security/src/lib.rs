//! The authenticated-account context threaded through domain services.
//!
//! Unlike a multi-tenant scope this control plane has one dimension of access control:
//! an account either belongs to a project (via membership) or it doesn't. [`AuthContext`]
//! carries the resolved account and how it got resolved, so domain services can decide
//! membership on a per-call basis against the store rather than trusting a pre-baked scope.

mod auth_context;

pub use auth_context::{AuthContext, Credential};
