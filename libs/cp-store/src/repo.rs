use async_trait::async_trait;
use cp_errors::CoreError;

use crate::entity::container_claim::{ClaimStatus, RunType};
use crate::entity::database_claim::DbCredential;
use crate::entity::{account, container_claim, container_zone, database_claim, db_zone, project, usage_counter};

/// Fields needed to record a new container claim's intent. Names/ports have already been
/// resolved by `cp-naming` by the time this reaches the store.
#[derive(Debug, Clone)]
pub struct NewContainerClaim {
    pub project_id: i64,
    pub creator_account_id: i64,
    pub name: String,
    pub image_ref: String,
    pub image_tag: String,
    pub command: Vec<String>,
    pub run_type: RunType,
    pub target_ports: Vec<i32>,
    pub zones: Vec<String>,
    pub env_var_names: Vec<String>,
    pub cpu_millicores: i32,
    pub memory_mb: i32,
}

/// The durable source of truth: accounts, projects, claims, usage counters, sessions.
///
/// All state transitions that must be atomic are exposed as single composite methods here
/// rather than leaving callers to compose several single-row operations, mirroring how the
/// original system wraps each business operation in one SQL transaction.
#[async_trait]
pub trait AuthoritativeStore: Send + Sync {
    // -- accounts / auth --
    async fn get_account(&self, account_id: i64) -> Result<account::Model, CoreError>;
    async fn find_account_by_username(&self, username: &str) -> Result<Option<account::Model>, CoreError>;
    async fn create_account(&self, username: &str, email: &str) -> Result<account::Model, CoreError>;
    async fn active_account_count(&self) -> Result<i64, CoreError>;
    async fn account_by_session(&self, token: &str) -> Result<account::Model, CoreError>;
    async fn account_by_api_token(&self, token: &str) -> Result<account::Model, CoreError>;
    async fn create_session(&self, account_id: i64) -> Result<String, CoreError>;
    async fn issue_api_token(&self, account_id: i64) -> Result<String, CoreError>;

    // -- projects --
    async fn create_project_for_account(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
    ) -> Result<project::Model, CoreError>;
    async fn get_project(&self, project_id: i64) -> Result<project::Model, CoreError>;
    async fn add_member_by_username(&self, project_id: i64, username: &str) -> Result<(), CoreError>;
    async fn is_member(&self, project_id: i64, account_id: i64) -> Result<bool, CoreError>;

    // -- zones --
    async fn upsert_container_zone(&self, zone: container_zone::Model) -> Result<(), CoreError>;
    async fn upsert_db_zone(&self, zone: db_zone::Model) -> Result<(), CoreError>;
    async fn list_container_zones(&self) -> Result<Vec<container_zone::Model>, CoreError>;
    async fn list_db_zones(&self) -> Result<Vec<db_zone::Model>, CoreError>;
    async fn get_container_zone(&self, name: &str) -> Result<container_zone::Model, CoreError>;
    async fn get_db_zone(&self, name: &str) -> Result<db_zone::Model, CoreError>;

    // -- container claims --
    async fn list_container_claims(&self, project_id: i64) -> Result<Vec<container_claim::Model>, CoreError>;
    async fn get_container_claim(&self, claim_id: i64) -> Result<container_claim::Model, CoreError>;
    async fn find_container_claim_by_name(
        &self,
        project_id: i64,
        name: &str,
    ) -> Result<Option<container_claim::Model>, CoreError>;
    /// Names colliding under the tightened uniqueness rule (exact match OR `{name}-<digits>`),
    /// restricted to non-deleted, non-inactive claims, most recent first.
    async fn find_colliding_claim_names(
        &self,
        project_id: i64,
        name: &str,
    ) -> Result<Vec<String>, CoreError>;
    async fn insert_container_claim(&self, new_claim: NewContainerClaim) -> Result<container_claim::Model, CoreError>;
    async fn set_container_status(&self, claim_id: i64, status: ClaimStatus) -> Result<(), CoreError>;
    async fn set_container_node_ip(&self, claim_id: i64, node_ip: &str) -> Result<(), CoreError>;
    async fn set_container_public_ports(&self, claim_id: i64, ports: Vec<i32>) -> Result<(), CoreError>;
    async fn soft_delete_container_claim(&self, claim_id: i64) -> Result<(), CoreError>;
    /// Attempt to reserve `candidate` as a public port on `claim_id` by appending it to the
    /// claim's `public_ports` column, inside one transaction. Returns `false` if any other
    /// non-deleted claim already holds that port.
    async fn try_reserve_port(&self, claim_id: i64, candidate: i32) -> Result<bool, CoreError>;

    // -- database claims --
    async fn get_database_claim_for_project(
        &self,
        project_id: i64,
    ) -> Result<Option<database_claim::Model>, CoreError>;
    async fn get_database_claim(&self, claim_id: i64) -> Result<database_claim::Model, CoreError>;
    async fn insert_database_claim(
        &self,
        project_id: i64,
        zones: Vec<String>,
        database_name: String,
    ) -> Result<database_claim::Model, CoreError>;
    async fn set_database_status(&self, claim_id: i64, status: ClaimStatus) -> Result<(), CoreError>;
    async fn append_database_credential(&self, claim_id: i64, cred: DbCredential) -> Result<(), CoreError>;
    async fn soft_delete_database_claim(&self, claim_id: i64) -> Result<(), CoreError>;

    // -- usage counters --
    async fn get_usage(&self, account_id: i64, zone: &str) -> Result<usage_counter::Model, CoreError>;
    async fn add_usage(&self, account_id: i64, zone: &str, cpu: i32, mem: i32) -> Result<(), CoreError>;
    /// Subtracts, clamping both counters to zero if the subtraction would go negative.
    async fn subtract_usage_clamped(&self, account_id: i64, zone: &str, cpu: i32, mem: i32) -> Result<(), CoreError>;
}
