use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

pub use crate::entity::container_claim::ClaimStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "object_storage_claim")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[sea_orm(column_type = "Json")]
    pub zones: Vec<String>,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
