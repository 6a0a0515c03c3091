pub mod account;
pub mod api_token;
pub mod billing;
pub mod container_claim;
pub mod container_zone;
pub mod database_claim;
pub mod db_zone;
pub mod membership;
pub mod object_storage_claim;
pub mod project;
pub mod session;
pub mod usage_counter;
