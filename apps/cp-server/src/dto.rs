//! Wire-format response bodies. Kept separate from the entity `Model`s so storage
//! layout can change without touching the public API, and so every entity doesn't need
//! to carry `serde::Serialize` derives purely for the HTTP edge's sake.

use cp_store::entity::{container_claim, database_claim, project};
use serde::Serialize;

#[derive(Serialize)]
pub struct ContainerClaimView {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub image_ref: String,
    pub image_tag: String,
    pub command: Vec<String>,
    pub run_type: container_claim::RunType,
    pub target_ports: Vec<i32>,
    pub public_ports: Vec<i32>,
    pub zones: Vec<String>,
    pub env_var_names: Vec<String>,
    pub cpu_millicores: i32,
    pub memory_mb: i32,
    pub node_ip: Option<String>,
    pub status: container_claim::ClaimStatus,
}

impl From<container_claim::Model> for ContainerClaimView {
    fn from(m: container_claim::Model) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            name: m.name,
            image_ref: m.image_ref,
            image_tag: m.image_tag,
            command: m.command,
            run_type: m.run_type,
            target_ports: m.target_ports,
            public_ports: m.public_ports,
            zones: m.zones,
            env_var_names: m.env_var_names,
            cpu_millicores: m.cpu_millicores,
            memory_mb: m.memory_mb,
            node_ip: m.node_ip,
            status: m.status,
        }
    }
}

#[derive(Serialize)]
pub struct ContainerClaimWithLogsView {
    #[serde(flatten)]
    pub claim: ContainerClaimView,
    /// Pod logs collected per zone the claim targets. Empty string if the backend has no
    /// matching pod yet (e.g. still `activating`).
    pub logs_by_zone: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct DatabaseClaimView {
    pub id: i64,
    pub project_id: i64,
    pub zones: Vec<String>,
    pub database_name: String,
    pub credentials: Vec<database_claim::DbCredential>,
    pub status: database_claim::ClaimStatus,
}

impl From<database_claim::Model> for DatabaseClaimView {
    fn from(m: database_claim::Model) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            zones: m.zones,
            database_name: m.database_name,
            credentials: m.credentials,
            status: m.status,
        }
    }
}

#[derive(Serialize)]
pub struct ProjectView {
    pub id: i64,
    pub name: String,
    pub description: String,
}

impl From<project::Model> for ProjectView {
    fn from(m: project::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
        }
    }
}
