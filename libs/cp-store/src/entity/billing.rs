use sea_orm::entity::prelude::*;

/// No ledger mechanics beyond the creation hook; `current_credits`/`credits_delta` exist
/// so the row shape matches what a future billing module would read and write.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "billing")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub project_id: i64,
    pub current_credits: i64,
    pub credits_delta: i64,
    #[sea_orm(column_type = "Json")]
    pub details: serde_json::Value,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
