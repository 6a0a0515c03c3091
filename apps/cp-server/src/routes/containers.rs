use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use cp_container_reconciler::{EnvVar, ImagePullSecret};
use cp_errors::{CoreError, Problem};
use cp_orchestrator::ContainerCreateRequest;
use cp_security::AuthContext;
use cp_store::entity::container_claim::RunType;
use serde::{Deserialize, Serialize};

use crate::dto::{ContainerClaimView, ContainerClaimWithLogsView};
use crate::routes::authorized_project;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>, Path(proj): Path<i64>, ctx: AuthContext) -> Result<Json<Vec<ContainerClaimView>>, Problem> {
    authorized_project(&state, proj, &ctx).await?;
    let claims = state.store.list_container_claims(proj).await?;
    Ok(Json(claims.into_iter().map(ContainerClaimView::from).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    Path((proj, name)): Path<(i64, String)>,
    ctx: AuthContext,
) -> Result<Json<ContainerClaimWithLogsView>, Problem> {
    authorized_project(&state, proj, &ctx).await?;
    let claim = state
        .store
        .find_container_claim_by_name(proj, &name)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("container claim '{name}'")))?;

    let mut logs_by_zone = BTreeMap::new();
    let workload_name = cp_container_reconciler::ContainerReconciler::workload_name(&claim);
    let project = state.store.get_project(proj).await?;
    let namespace = cp_naming::templates::namespace_name(&project.name, project.id);
    for zone in &claim.zones {
        if let Ok(backend) = state.zones.container_backend(zone) {
            let logs = backend.pod_logs(&namespace, &workload_name).await.unwrap_or_default();
            logs_by_zone.insert(zone.clone(), logs);
        }
    }

    Ok(Json(ContainerClaimWithLogsView {
        claim: claim.into(),
        logs_by_zone,
    }))
}

#[derive(Deserialize)]
pub struct ImagePullSecretBody {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Deserialize)]
pub struct CreateContainerBody {
    pub name: String,
    #[serde(rename = "image-ref")]
    pub image_ref: String,
    #[serde(default, rename = "image-tag")]
    pub image_tag: String,
    #[serde(default, rename = "run-type")]
    pub run_type: String,
    #[serde(default, rename = "cpu-millicores")]
    pub cpu_millicores: i32,
    #[serde(default, rename = "memory-mb")]
    pub memory_mb: i32,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub port: Vec<i32>,
    pub zone: Vec<String>,
    #[serde(default, rename = "env-var-name")]
    pub env_var_name: Vec<String>,
    #[serde(default, rename = "env-var-value")]
    pub env_var_value: Vec<String>,
    #[serde(default, rename = "image-pull-secret")]
    pub image_pull_secret: Option<ImagePullSecretBody>,
}

fn parse_run_type(raw: &str) -> Result<RunType, CoreError> {
    match raw {
        "" | "permanent" => Ok(RunType::Permanent),
        "once" => Ok(RunType::Once),
        "schedule" => Ok(RunType::Schedule),
        other => Err(CoreError::validation("run-type", format!("unknown run type '{other}'"))),
    }
}

#[derive(Serialize)]
pub struct CreateContainerResponse {
    pub claim: ContainerClaimView,
}

pub async fn create(
    State(state): State<AppState>,
    Path(proj): Path<i64>,
    ctx: AuthContext,
    Json(body): Json<CreateContainerBody>,
) -> Result<Json<CreateContainerResponse>, Problem> {
    let project = authorized_project(&state, proj, &ctx).await?;

    if body.env_var_name.len() != body.env_var_value.len() {
        return Err(CoreError::validation("env-var-name", "must pair positionally with env-var-value").into());
    }
    let env_vars: Vec<EnvVar> = body
        .env_var_name
        .iter()
        .zip(body.env_var_value.iter())
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();

    let run_type = parse_run_type(&body.run_type)?;
    let image_pull_secret = body.image_pull_secret.map(|s| ImagePullSecret {
        url: s.url,
        email: s.email,
        username: s.username,
        password: s.password,
        token: s.token,
    });

    let claim = state
        .orchestrator
        .create_container(
            project,
            ContainerCreateRequest {
                creator_account_id: ctx.account_id(),
                name: body.name,
                image_ref: body.image_ref,
                image_tag: body.image_tag,
                command: body.command,
                run_type,
                target_ports: body.port,
                zones: body.zone,
                env_vars,
                cpu_millicores: body.cpu_millicores,
                memory_mb: body.memory_mb,
                image_pull_secret,
            },
        )
        .await?;

    Ok(Json(CreateContainerResponse { claim: claim.into() }))
}

pub async fn delete(State(state): State<AppState>, Path((proj, name)): Path<(i64, String)>, ctx: AuthContext) -> Result<(), Problem> {
    let project = authorized_project(&state, proj, &ctx).await?;
    let claim = state
        .store
        .find_container_claim_by_name(proj, &name)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("container claim '{name}'")))?;
    state.orchestrator.delete_container(project, claim).await?;
    Ok(())
}

pub async fn rerun_once(State(state): State<AppState>, Path((proj, name)): Path<(i64, String)>, ctx: AuthContext) -> Result<(), Problem> {
    let project = authorized_project(&state, proj, &ctx).await?;
    let claim = state
        .store
        .find_container_claim_by_name(proj, &name)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("container claim '{name}'")))?;
    state.orchestrator.rerun_container(project, claim).await;
    Ok(())
}
