//! Minimal session exchange. Full identity-provider integration (OAuth) is out of scope;
//! this trades a known account's username for a session cookie, mirroring the shape of
//! the collaborator it replaces without reimplementing its OAuth dance.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use cp_errors::Problem;
use serde::Deserialize;

use crate::auth::SESSION_COOKIE;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Result<Response, Problem> {
    let account = state
        .store
        .find_account_by_username(&body.username)
        .await?
        .ok_or_else(|| cp_errors::CoreError::not_found(format!("account '{}'", body.username)))?;

    let token = state.store.create_session(account.id).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .max_age(time::Duration::seconds(3600))
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((axum::http::StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response())
}
