pub mod auth_routes;
pub mod containers;
pub mod databases;
pub mod projects;

use axum::routing::post;
use axum::Router;
use cp_errors::CoreError;
use cp_security::AuthContext;
use cp_store::entity::project;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth_routes::login))
        .route("/project/{proj}/create", post(projects::create))
        .route("/project/{proj}/add-member", post(projects::add_member))
        .route("/project/{proj}/get-all-containers", post(containers::list))
        .route("/project/{proj}/container/{name}", post(containers::get))
        .route("/project/{proj}/create-container", post(containers::create))
        .route("/project/{proj}/container/{name}/delete", post(containers::delete))
        .route("/project/{proj}/container/{name}/rerun-once", post(containers::rerun_once))
        .route("/project/{proj}/get-all-databases", post(databases::list))
        .route("/project/{proj}/create-database", post(databases::create))
        .route("/project/{proj}/database/{id}/add-user", post(databases::add_user))
        .route("/project/{proj}/database/{id}/delete", post(databases::delete))
}

/// Loads the project and checks the caller belongs to it. `NotFound` either way, so an
/// outsider can't distinguish "doesn't exist" from "exists, not yours".
pub(crate) async fn authorized_project(state: &AppState, project_id: i64, ctx: &AuthContext) -> Result<project::Model, CoreError> {
    let project = state.store.get_project(project_id).await?;
    if !state.store.is_member(project_id, ctx.account_id()).await? {
        return Err(CoreError::not_found("project"));
    }
    Ok(project)
}
