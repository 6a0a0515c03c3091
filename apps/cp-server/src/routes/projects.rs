use axum::extract::{Path, State};
use axum::Json;
use cp_errors::Problem;
use cp_security::AuthContext;
use serde::Deserialize;

use crate::dto::ProjectView;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// `proj` in the path is ignored here; a project is created *for* the caller's account,
/// the id in the path is only meaningful once the project exists. Kept for symmetry with
/// every other route under `/project/{proj}/...` rather than a separate `/projects` root.
pub async fn create(State(state): State<AppState>, Path(_proj): Path<i64>, ctx: AuthContext, Json(body): Json<CreateProjectBody>) -> Result<Json<ProjectView>, Problem> {
    let project = state.store.create_project_for_account(ctx.account_id(), &body.name, &body.description).await?;
    Ok(Json(project.into()))
}

#[derive(Deserialize)]
pub struct AddMemberBody {
    pub username: String,
}

pub async fn add_member(State(state): State<AppState>, Path(proj): Path<i64>, ctx: AuthContext, Json(body): Json<AddMemberBody>) -> Result<(), Problem> {
    super::authorized_project(&state, proj, &ctx).await?;
    state.store.add_member_by_username(proj, &body.username).await?;
    Ok(())
}
