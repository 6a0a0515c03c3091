use axum::extract::{Path, State};
use axum::Json;
use cp_errors::{CoreError, Problem};
use cp_security::AuthContext;
use serde::{Deserialize, Serialize};

use crate::dto::DatabaseClaimView;
use crate::routes::authorized_project;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Path(proj): Path<i64>, ctx: AuthContext) -> Result<Json<Vec<DatabaseClaimView>>, Problem> {
    authorized_project(&state, proj, &ctx).await?;
    let claim = state.store.get_database_claim_for_project(proj).await?;
    Ok(Json(claim.into_iter().map(DatabaseClaimView::from).collect()))
}

#[derive(Deserialize)]
pub struct CreateDatabaseBody {
    pub zone: Vec<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Path(proj): Path<i64>,
    ctx: AuthContext,
    Json(body): Json<CreateDatabaseBody>,
) -> Result<Json<DatabaseClaimView>, Problem> {
    let project = authorized_project(&state, proj, &ctx).await?;
    let claim = state.orchestrator.create_database(&project, body.zone).await?;
    Ok(Json(claim.into()))
}

#[derive(Deserialize)]
pub struct AddUserBody {
    pub username: String,
    #[serde(rename = "access-control-type")]
    pub access_control_type: String,
}

#[derive(Serialize)]
pub struct AddUserResponse {
    pub username: String,
    pub password: String,
    pub access_control_type: String,
}

pub async fn add_user(
    State(state): State<AppState>,
    Path((proj, id)): Path<(i64, i64)>,
    ctx: AuthContext,
    Json(body): Json<AddUserBody>,
) -> Result<Json<AddUserResponse>, Problem> {
    authorized_project(&state, proj, &ctx).await?;
    let claim = state.store.get_database_claim(id).await?;
    if claim.project_id != proj {
        return Err(CoreError::not_found("database claim").into());
    }
    let credential = state.orchestrator.add_database_user(&claim, &body.username, &body.access_control_type).await?;
    Ok(Json(AddUserResponse {
        username: credential.username,
        password: credential.password,
        access_control_type: credential.access_control_type,
    }))
}

pub async fn delete(State(state): State<AppState>, Path((proj, id)): Path<(i64, i64)>, ctx: AuthContext) -> Result<(), Problem> {
    authorized_project(&state, proj, &ctx).await?;
    let claim = state.store.get_database_claim(id).await?;
    if claim.project_id != proj {
        return Err(CoreError::not_found("database claim").into());
    }
    state.orchestrator.delete_database(claim).await;
    Ok(())
}
