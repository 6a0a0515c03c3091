use sea_orm::entity::prelude::*;

/// One row per (active account, zone). Invariant: both counters stay `>= 0`; see
/// `cp-quota` for the clamp-on-underflow behavior that keeps this true under concurrency.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "container_resource_usage_per_account_per_zone")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub zone_name: String,
    pub used_cpu_millicores: i32,
    pub used_memory_mb: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
