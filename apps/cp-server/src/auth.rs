//! Authentication middleware: resolves the caller's identity against the authoritative
//! store, either from a `session_token` cookie or an `Authorization: Bearer` header.
//! Bearer takes priority when both are present, mirroring the collaborator this replaces.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use cp_errors::{catalog, CoreError, Problem};
use cp_security::{AuthContext, Credential};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_token";

/// Paths reachable without any credential: the minimal unauthenticated surface (§6).
fn is_public(path: &str) -> bool {
    path == "/" || path == "/login" || path == "/auth/login" || path.starts_with("/static")
}

pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if is_public(&path) {
        return next.run(req).await;
    }

    match resolve_identity(&state, &req).await {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(problem) => problem.into_response(),
    }
}

async fn resolve_identity(state: &AppState, req: &Request) -> Result<AuthContext, Problem> {
    if let Some(token) = bearer_token(req) {
        return state
            .store
            .account_by_api_token(token)
            .await
            .map(|account| AuthContext::new(account.id, account.username, Credential::ApiToken))
            .map_err(|err| unauthorized_problem(&err));
    }

    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return state
            .store
            .account_by_session(cookie.value())
            .await
            .map(|account| AuthContext::new(account.id, account.username, Credential::Session))
            .map_err(|err| unauthorized_problem(&err));
    }

    Err(catalog::UNAUTHORIZED.as_problem("no session cookie or bearer token presented"))
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized_problem(err: &CoreError) -> Problem {
    match err {
        CoreError::NotFound(_) => catalog::UNAUTHORIZED.as_problem("credential did not resolve to an account"),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_login_paths_are_public() {
        assert!(is_public("/"));
        assert!(is_public("/login"));
        assert!(is_public("/auth/login"));
        assert!(is_public("/static/app.css"));
        assert!(!is_public("/project/1/get-all-containers"));
    }
}
