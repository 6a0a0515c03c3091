//! Claim orchestrator: the thin façade collaborators call into. Validates a request against
//! the authoritative store, records intent (inserts the row, flips status toward
//! `activating`/`deactivating`), then dispatches the matching reconciler as a background task
//! and returns the intent-recorded row immediately. Reconciliation runs to completion or to a
//! terminal `error` state without blocking the caller.

use std::sync::Arc;
use std::time::Duration;

use cp_container_reconciler::{ContainerReconciler, EnvVar, ImagePullSecret};
use cp_database_reconciler::DatabaseReconciler;
use cp_errors::CoreError;
use cp_naming::NamingService;
use cp_naming::templates;
use cp_quota::QuotaEngine;
use cp_store::entity::container_claim::RunType;
use cp_store::entity::{container_claim, database_claim, project};
use cp_store::{AuthoritativeStore, NewContainerClaim};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// Everything needed to record and reconcile a new container claim. `env_vars` and
/// `image_pull_secret` live only for the duration of the dispatched reconciliation.
pub struct ContainerCreateRequest {
    pub creator_account_id: i64,
    pub name: String,
    pub image_ref: String,
    pub image_tag: String,
    pub command: Vec<String>,
    pub run_type: RunType,
    pub target_ports: Vec<i32>,
    pub zones: Vec<String>,
    pub env_vars: Vec<EnvVar>,
    pub cpu_millicores: i32,
    pub memory_mb: i32,
    pub image_pull_secret: Option<ImagePullSecret>,
}

const DEFAULT_CPU_MILLICORES: i32 = 100;
const DEFAULT_MEMORY_MB: i32 = 256;
const DEFAULT_IMAGE_TAG: &str = "latest";

/// Applies the data-model defaults for fields a caller left unset: 100 millicores, 256 MiB,
/// image tag `latest`, run type `permanent`.
fn apply_container_defaults(request: &mut ContainerCreateRequest) {
    if request.cpu_millicores == 0 {
        request.cpu_millicores = DEFAULT_CPU_MILLICORES;
    }
    if request.memory_mb == 0 {
        request.memory_mb = DEFAULT_MEMORY_MB;
    }
    if request.image_tag.is_empty() {
        request.image_tag = DEFAULT_IMAGE_TAG.to_owned();
    }
}

fn env_var_names(request: &ContainerCreateRequest) -> Vec<String> {
    let mut names: Vec<String> = request.env_vars.iter().map(|v| v.name.clone()).collect();
    if request.image_pull_secret.as_ref().is_some_and(|s| !s.url.is_empty()) {
        names.push("image-pull-secret".to_owned());
    }
    names
}

pub struct ClaimOrchestrator {
    store: Arc<dyn AuthoritativeStore>,
    quota: Arc<QuotaEngine>,
    naming: Arc<NamingService>,
    container_reconciler: Arc<ContainerReconciler>,
    database_reconciler: Arc<DatabaseReconciler>,
    /// Caps concurrently in-flight background reconciliation tasks; acquired inside the
    /// spawned task itself so it bounds running work, not merely queued work.
    reconciliation_limit: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl ClaimOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthoritativeStore>,
        quota: Arc<QuotaEngine>,
        naming: Arc<NamingService>,
        container_reconciler: Arc<ContainerReconciler>,
        database_reconciler: Arc<DatabaseReconciler>,
        max_concurrent_reconciliations: usize,
    ) -> Self {
        Self {
            store,
            quota,
            naming,
            container_reconciler,
            database_reconciler,
            reconciliation_limit: Arc::new(Semaphore::new(max_concurrent_reconciliations)),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Resolves a unique name, checks fair-share admission, records the claim as
    /// `activating`, commits its usage, and dispatches the container reconciler in the
    /// background. Returns the row as recorded; reconciliation may still fail it to `error`.
    pub async fn create_container(&self, project: project::Model, mut request: ContainerCreateRequest) -> Result<container_claim::Model, CoreError> {
        apply_container_defaults(&mut request);

        let resolved_name = self.naming.resolve_unique_claim_name(project.id, &request.name).await?;
        self.quota
            .check_admission(request.creator_account_id, &request.zones, request.cpu_millicores, request.memory_mb)
            .await?;

        let claim = self
            .store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: request.creator_account_id,
                name: resolved_name,
                image_ref: request.image_ref.clone(),
                image_tag: request.image_tag.clone(),
                command: request.command.clone(),
                run_type: request.run_type.clone(),
                target_ports: request.target_ports.clone(),
                zones: request.zones.clone(),
                env_var_names: env_var_names(&request),
                cpu_millicores: request.cpu_millicores,
                memory_mb: request.memory_mb,
            })
            .await?;

        self.spawn_container_create(project, claim.clone(), request.env_vars, request.image_pull_secret).await;
        Ok(claim)
    }

    /// Quota is only added once the reconciler actually reaches `active`, mirroring AS's
    /// rule that usage tracks the status transition rather than claim intent.
    async fn spawn_container_create(&self, project: project::Model, claim: container_claim::Model, env_vars: Vec<EnvVar>, image_pull_secret: Option<ImagePullSecret>) {
        let reconciler = self.container_reconciler.clone();
        let quota = self.quota.clone();
        let limit = self.reconciliation_limit.clone();
        self.tasks.lock().await.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else { return };
            match reconciler.create(&project, &claim, &env_vars, image_pull_secret.as_ref(), false).await {
                Ok(()) => {
                    if let Err(err) = quota.commit(claim.creator_account_id, &claim.zones, claim.cpu_millicores, claim.memory_mb).await {
                        tracing::error!(claim_id = claim.id, error = %err, "failed to commit quota usage after container create");
                    }
                }
                Err(err) => {
                    tracing::error!(claim_id = claim.id, error = %err, "background container create failed");
                }
            }
        });
    }

    /// Records the claim as `deactivating`, releases its usage, and dispatches deletion.
    pub async fn delete_container(&self, project: project::Model, claim: container_claim::Model) -> Result<(), CoreError> {
        self.store.set_container_status(claim.id, cp_store::entity::container_claim::ClaimStatus::Deactivating).await?;
        self.quota
            .release(claim.creator_account_id, &claim.zones, claim.cpu_millicores, claim.memory_mb)
            .await?;
        self.spawn_container_delete(project, claim, false).await;
        Ok(())
    }

    async fn spawn_container_delete(&self, project: project::Model, claim: container_claim::Model, recreate: bool) {
        let reconciler = self.container_reconciler.clone();
        let limit = self.reconciliation_limit.clone();
        self.tasks.lock().await.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else { return };
            if let Err(err) = reconciler.delete(&project, &claim, recreate).await {
                tracing::error!(claim_id = claim.id, error = %err, "background container delete failed");
            }
        });
    }

    /// Dispatches a re-run: resource footprint is unchanged, so quota is left untouched.
    pub async fn rerun_container(&self, project: project::Model, claim: container_claim::Model) {
        let reconciler = self.container_reconciler.clone();
        let limit = self.reconciliation_limit.clone();
        self.tasks.lock().await.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else { return };
            if let Err(err) = reconciler.rerun(&project, &claim).await {
                tracing::error!(claim_id = claim.id, error = %err, "background container rerun failed");
            }
        });
    }

    /// Records a new database claim as `activating` and dispatches provisioning.
    pub async fn create_database(&self, project: &project::Model, zones: Vec<String>) -> Result<database_claim::Model, CoreError> {
        let database_name = templates::database_name(&project.name, project.id);
        let claim = self.store.insert_database_claim(project.id, zones, database_name).await?;
        self.spawn_database_create(claim.clone()).await;
        Ok(claim)
    }

    async fn spawn_database_create(&self, claim: database_claim::Model) {
        let reconciler = self.database_reconciler.clone();
        let limit = self.reconciliation_limit.clone();
        self.tasks.lock().await.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else { return };
            if let Err(err) = reconciler.create(&claim).await {
                tracing::error!(claim_id = claim.id, error = %err, "background database create failed");
            }
        });
    }

    /// Dispatches teardown of a database claim in the background.
    pub async fn delete_database(&self, claim: database_claim::Model) {
        let reconciler = self.database_reconciler.clone();
        let limit = self.reconciliation_limit.clone();
        self.tasks.lock().await.spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else { return };
            if let Err(err) = reconciler.delete(&claim).await {
                tracing::error!(claim_id = claim.id, error = %err, "background database delete failed");
            }
        });
    }

    /// Issues a further database user. Cheap metadata work, done inline rather than
    /// dispatched, unlike the claim-lifecycle transitions above.
    pub async fn add_database_user(
        &self,
        claim: &database_claim::Model,
        username: &str,
        access_control_type: &str,
    ) -> Result<cp_store::entity::database_claim::DbCredential, CoreError> {
        self.database_reconciler.add_user(claim, username, access_control_type).await
    }

    /// Drains in-flight reconciliation tasks, waiting up to `timeout`. Mirrors a
    /// process-wide graceful shutdown: the front-line surface stops first (the caller's
    /// responsibility), then outstanding reconcilers get a bounded grace period.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), CoreError> {
        let mut tasks = self.tasks.lock().await;
        let drain = async {
            while tasks.join_next().await.is_some() {}
        };
        tokio::time::timeout(timeout, drain)
            .await
            .map_err(|_| CoreError::backend("shutdown deadline exceeded waiting for reconcilers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_backends::InMemoryContainerBackend;
    use cp_store::SeaOrmStore;
    use cp_zones::{ContainerZoneConfig, DbZoneConfig, ZoneRegistry};

    async fn harness() -> (Arc<SeaOrmStore>, Arc<ZoneRegistry>, project::Model, ClaimOrchestrator) {
        let store = Arc::new(SeaOrmStore::connect("sqlite::memory:").await.unwrap());
        store.migrate().await.unwrap();
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store.create_project_for_account(account.id, "demo", "").await.unwrap();

        let zones = Arc::new(
            ZoneRegistry::bootstrap(
                &[ContainerZoneConfig {
                    name: "zone-a".into(),
                    default_routing_ip: "10.0.0.1".into(),
                    cpu_millicores: 4000,
                    memory_mb: 8192,
                }],
                &[DbZoneConfig {
                    name: "dbzone-a".into(),
                    connection_url: "postgres://admin@localhost/admin".into(),
                }],
                &*store,
            )
            .await
            .unwrap(),
        );
        let naming = Arc::new(NamingService::new(store.clone()));
        let quota = Arc::new(QuotaEngine::new(store.clone()));
        let container_reconciler = Arc::new(cp_container_reconciler::ContainerReconciler::new(store.clone(), zones.clone(), naming.clone()));
        let database_reconciler = Arc::new(DatabaseReconciler::new(store.clone(), zones.clone()));

        let orchestrator = ClaimOrchestrator::new(store.clone(), quota, naming, container_reconciler, database_reconciler, 4);
        (store, zones, project, orchestrator)
    }

    #[tokio::test]
    async fn create_container_records_activating_row_and_reconciles_to_active() {
        let (store, zones, project, orchestrator) = harness().await;

        let namespace = templates::namespace_name(&project.name, project.id);
        let backend = zones.container_backend("zone-a").unwrap();
        // The workload name embeds the not-yet-known claim id, so pre-seed every id this
        // fresh store could hand out for the first claim.
        if let Some(in_memory) = backend.as_any().downcast_ref::<InMemoryContainerBackend>() {
            in_memory.set_pod_host_ip(&namespace, "deployment-svc-1", "10.1.1.5");
        }

        let claim = orchestrator
            .create_container(
                project.clone(),
                ContainerCreateRequest {
                    creator_account_id: 1,
                    name: "svc".into(),
                    image_ref: "nginx".into(),
                    image_tag: "latest".into(),
                    command: vec![],
                    run_type: RunType::Permanent,
                    target_ports: vec![8080],
                    zones: vec!["zone-a".into()],
                    env_vars: vec![],
                    cpu_millicores: 100,
                    memory_mb: 256,
                    image_pull_secret: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(claim.name, "svc");

        orchestrator.shutdown(Duration::from_secs(5)).await.unwrap();

        let reloaded = store.get_container_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.status, cp_store::entity::container_claim::ClaimStatus::Active);

        let usage = store.get_usage(1, "zone-a").await.unwrap();
        assert_eq!(usage.used_cpu_millicores, 100);
    }

    #[tokio::test]
    async fn delete_container_releases_quota_before_reconciliation_finishes() {
        let (store, zones, project, orchestrator) = harness().await;
        let namespace = templates::namespace_name(&project.name, project.id);
        let backend = zones.container_backend("zone-a").unwrap();
        if let Some(in_memory) = backend.as_any().downcast_ref::<InMemoryContainerBackend>() {
            in_memory.set_pod_host_ip(&namespace, "deployment-svc-1", "10.1.1.5");
        }

        let claim = orchestrator
            .create_container(
                project.clone(),
                ContainerCreateRequest {
                    creator_account_id: 1,
                    name: "svc".into(),
                    image_ref: "nginx".into(),
                    image_tag: "latest".into(),
                    command: vec![],
                    run_type: RunType::Permanent,
                    target_ports: vec![],
                    zones: vec!["zone-a".into()],
                    env_vars: vec![],
                    cpu_millicores: 100,
                    memory_mb: 256,
                    image_pull_secret: None,
                },
            )
            .await
            .unwrap();
        orchestrator.shutdown(Duration::from_secs(5)).await.unwrap();

        orchestrator.delete_container(project.clone(), claim.clone()).await.unwrap();
        let usage = store.get_usage(1, "zone-a").await.unwrap();
        assert_eq!(usage.used_cpu_millicores, 0);

        orchestrator.shutdown(Duration::from_secs(5)).await.unwrap();
        let reloaded = store.get_container_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.status, cp_store::entity::container_claim::ClaimStatus::Inactive);
    }

    #[tokio::test]
    async fn create_container_rejects_requests_beyond_fair_share() {
        let (_store, _zones, project, orchestrator) = harness().await;
        let err = orchestrator
            .create_container(
                project,
                ContainerCreateRequest {
                    creator_account_id: 1,
                    name: "too-big".into(),
                    image_ref: "nginx".into(),
                    image_tag: "latest".into(),
                    command: vec![],
                    run_type: RunType::Permanent,
                    target_ports: vec![],
                    zones: vec!["zone-a".into()],
                    env_vars: vec![],
                    cpu_millicores: 100_000,
                    memory_mb: 256,
                    image_pull_secret: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded(_)));
    }
}
