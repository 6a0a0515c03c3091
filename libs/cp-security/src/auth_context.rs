/// How the caller's identity was established for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Credential {
    Session,
    ApiToken,
}

/// The account behind the current request, plus how it was authenticated.
///
/// Domain services accept `&AuthContext` rather than a bare account id so that audit
/// fields (`created_by`/`updated_by`) and future authorization decisions have one place
/// to read the caller's identity from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthContext {
    account_id: i64,
    username: String,
    credential: Credential,
}

impl AuthContext {
    #[must_use]
    pub fn new(account_id: i64, username: impl Into<String>, credential: Credential) -> Self {
        Self {
            account_id,
            username: username.into(),
            credential,
        }
    }

    #[inline]
    #[must_use]
    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    #[inline]
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[inline]
    #[must_use]
    pub fn credential(&self) -> Credential {
        self.credential
    }

    // audit helpers
    #[inline]
    #[must_use]
    pub fn created_by(&self) -> i64 {
        self.account_id
    }
    #[inline]
    #[must_use]
    pub fn updated_by(&self) -> i64 {
        self.account_id
    }
}

#[cfg(feature = "axum")]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for AuthContext {
    type Rejection = cp_errors::Problem;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| cp_errors::catalog::UNAUTHORIZED.as_problem("request was not authenticated"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_account_identity() {
        let ctx = AuthContext::new(42, "ada", Credential::Session);
        assert_eq!(ctx.account_id(), 42);
        assert_eq!(ctx.created_by(), 42);
        assert_eq!(ctx.credential(), Credential::Session);
    }
}
