//! Static error catalog for the control plane's public error taxonomy.

use crate::problem::Problem;
use http::StatusCode;

/// A statically declared error definition, turned into a [`Problem`] at the point of use.
#[derive(Debug, Clone, Copy)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub type_url: &'static str,
}

impl ErrDef {
    #[inline]
    pub fn as_problem(&self, detail: impl Into<String>) -> Problem {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Problem::new(status, self.title, detail.into())
            .with_code(self.code)
            .with_type(self.type_url)
    }
}

macro_rules! err_def {
    ($name:ident, $status:expr, $title:expr, $code:expr) => {
        pub const $name: ErrDef = ErrDef {
            status: $status,
            title: $title,
            code: $code,
            type_url: concat!("https://errors.cpctl.dev/", $code),
        };
    };
}

err_def!(VALIDATION, 422, "Validation Failed", "VALIDATION_ERROR");
err_def!(NOT_FOUND, 404, "Not Found", "NOT_FOUND");
err_def!(QUOTA_EXCEEDED, 409, "Quota Exceeded", "QUOTA_EXCEEDED");
err_def!(CONFLICT, 409, "Conflict", "CONFLICT");
err_def!(UNAUTHORIZED, 401, "Not Authorized", "UNAUTHORIZED");
err_def!(FORBIDDEN, 403, "Forbidden", "FORBIDDEN");
err_def!(BACKEND_ERROR, 502, "Backend Error", "BACKEND_ERROR");
err_def!(INTERNAL, 500, "Internal Server Error", "INTERNAL_ERROR");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn err_def_to_problem_works() {
        let problem = NOT_FOUND.as_problem("container claim not found");
        assert_eq!(problem.status, StatusCode::NOT_FOUND);
        assert_eq!(problem.code, "NOT_FOUND");
        assert_eq!(problem.detail, "container claim not found");
    }

    #[test]
    fn quota_exceeded_maps_to_409() {
        let problem = QUOTA_EXCEEDED.as_problem("cpu request exceeds fair share");
        assert_eq!(problem.status, StatusCode::CONFLICT);
    }
}
