use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

pub use crate::entity::container_claim::ClaimStatus;

/// A single issued database credential, appended to as `add-user` requests come in.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DbCredential {
    pub username: String,
    pub password: String,
    pub access_control_type: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "database_claim")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    #[sea_orm(column_type = "Json")]
    pub zones: Vec<String>,
    pub database_name: String,
    #[sea_orm(column_type = "Json")]
    pub credentials: Vec<DbCredential>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
