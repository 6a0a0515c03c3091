use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Run-type of a container claim; see naming/port allocation templates for how this
/// feeds into workload kind selection (Deployment vs. Job) in the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum RunType {
    #[sea_orm(string_value = "permanent")]
    Permanent,
    #[sea_orm(string_value = "once")]
    Once,
    #[sea_orm(string_value = "schedule")]
    Schedule,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ClaimStatus {
    #[sea_orm(string_value = "activating")]
    Activating,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "deactivating")]
    Deactivating,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "error")]
    Error,
}

impl ClaimStatus {
    /// `true` for the two states the claim never leaves on its own.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Inactive | ClaimStatus::Error)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "container_claim")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub creator_account_id: i64,
    pub name: String,
    pub image_ref: String,
    pub image_tag: String,
    /// JSON array of command override tokens; empty means "use the image's entrypoint".
    #[sea_orm(column_type = "Json")]
    pub command: Vec<String>,
    pub run_type: RunType,
    #[sea_orm(column_type = "Json")]
    pub target_ports: Vec<i32>,
    #[sea_orm(column_type = "Json")]
    pub public_ports: Vec<i32>,
    #[sea_orm(column_type = "Json")]
    pub zones: Vec<String>,
    #[sea_orm(column_type = "Json")]
    pub env_var_names: Vec<String>,
    pub cpu_millicores: i32,
    pub memory_mb: i32,
    pub node_ip: Option<String>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
