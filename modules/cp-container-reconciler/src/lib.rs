//! Container reconciler: brings a container claim's backend artifacts up and down across
//! its zones, with compensation on partial failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cp_backends::{ContainerBackend, WorkloadSpec, encode_image_pull_secret};
use cp_errors::CoreError;
use cp_naming::NamingService;
use cp_naming::templates;
use cp_store::entity::container_claim::{ClaimStatus, Model as ContainerClaim, RunType};
use cp_store::entity::project;
use cp_store::{AuthoritativeStore, NewContainerClaim};
use cp_zones::ZoneRegistry;

const DEFAULT_NODE_IP_POLL_ATTEMPTS: u32 = 30;
const DEFAULT_NODE_IP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// An environment variable value, held only for the duration of one reconciliation call.
/// The claim row persists `name` alone; `value` never reaches the authoritative store.
#[derive(Debug, Clone)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Transient private-registry credentials, same lifetime rule as [`EnvVar`].
#[derive(Debug, Clone, Default)]
pub struct ImagePullSecret {
    pub url: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

const IMAGE_PULL_SECRET_ENV_NAME: &str = "image-pull-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    Secret,
    Deployment,
    Job,
    Service,
}

#[derive(Debug, Clone)]
struct RolledBackArtifact {
    zone: String,
    kind: ArtifactKind,
    namespace: String,
    name: String,
}

pub struct ContainerReconciler {
    store: Arc<dyn AuthoritativeStore>,
    zones: Arc<ZoneRegistry>,
    naming: Arc<NamingService>,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl ContainerReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn AuthoritativeStore>, zones: Arc<ZoneRegistry>, naming: Arc<NamingService>) -> Self {
        Self {
            store,
            zones,
            naming,
            poll_attempts: DEFAULT_NODE_IP_POLL_ATTEMPTS,
            poll_interval: DEFAULT_NODE_IP_POLL_INTERVAL,
        }
    }

    /// Overrides the node-ip discovery poll cadence. Tests pre-seed the backend with a
    /// host ip so this never actually needs to wait, but the knob exists so it can.
    #[must_use]
    pub fn with_node_ip_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    pub fn workload_name(claim: &ContainerClaim) -> String {
        if claim.run_type == RunType::Once {
            templates::job_name(&claim.name, claim.id)
        } else {
            templates::deployment_name(&claim.name, claim.id)
        }
    }

    /// Brings the claim's workload up on every zone it targets. On any backend failure,
    /// rolls back every artifact created so far in this call and leaves the claim `error`.
    pub async fn create(
        &self,
        project: &project::Model,
        claim: &ContainerClaim,
        env_vars: &[EnvVar],
        image_pull_secret: Option<&ImagePullSecret>,
        recreate: bool,
    ) -> Result<(), CoreError> {
        self.store.set_container_status(claim.id, ClaimStatus::Activating).await?;

        match self.create_inner(project, claim, env_vars, image_pull_secret, recreate).await {
            Ok(()) => {
                self.store.set_container_status(claim.id, ClaimStatus::Active).await?;
                Ok(())
            }
            Err(err) => {
                tracing::error!(claim_id = claim.id, error = %err, "container create failed");
                self.store.set_container_status(claim.id, ClaimStatus::Error).await?;
                Err(err)
            }
        }
    }

    async fn create_inner(
        &self,
        project: &project::Model,
        claim: &ContainerClaim,
        env_vars: &[EnvVar],
        image_pull_secret: Option<&ImagePullSecret>,
        recreate: bool,
    ) -> Result<(), CoreError> {
        let namespace = templates::namespace_name(&project.name, project.id);
        let workload_name = Self::workload_name(claim);
        let mut rollback_log: Vec<RolledBackArtifact> = Vec::new();

        for zone_name in &claim.zones {
            let backend = self.zones.container_backend(zone_name)?;
            backend.ensure_namespace(&namespace).await?;
            backend.ensure_default_limit_range(&namespace).await?;

            let mut env_secret_names = Vec::new();

            if !recreate {
                for env_var in env_vars {
                    let secret_name = templates::secret_name(&claim.name, &env_var.name);
                    if let Err(err) = backend
                        .create_secret(&namespace, &secret_name, HashMap::from([(env_var.name.clone(), env_var.value.clone())]))
                        .await
                    {
                        self.rollback(&rollback_log).await;
                        return Err(err);
                    }
                    rollback_log.push(RolledBackArtifact {
                        zone: zone_name.clone(),
                        kind: ArtifactKind::Secret,
                        namespace: namespace.clone(),
                        name: secret_name.clone(),
                    });
                    env_secret_names.push(secret_name);
                }
            } else {
                for env_var_name in &claim.env_var_names {
                    if env_var_name == IMAGE_PULL_SECRET_ENV_NAME {
                        continue;
                    }
                    let secret_name = templates::secret_name(&claim.name, env_var_name);
                    if !backend.secret_exists(&namespace, &secret_name).await? {
                        self.rollback(&rollback_log).await;
                        return Err(CoreError::backend(format!("recreate references missing secret '{secret_name}'")));
                    }
                    env_secret_names.push(secret_name);
                }
            }

            let image_pull_secret_name = match self
                .prepare_image_pull_secret(&backend, &namespace, claim, image_pull_secret, recreate, &mut rollback_log, zone_name)
                .await
            {
                Ok(name) => name,
                Err(err) => {
                    self.rollback(&rollback_log).await;
                    return Err(err);
                }
            };

            let spec = WorkloadSpec {
                name: workload_name.clone(),
                image_ref: claim.image_ref.clone(),
                image_tag: claim.image_tag.clone(),
                command: claim.command.clone(),
                env_secret_names,
                target_ports: claim.target_ports.clone(),
                cpu_millicores: claim.cpu_millicores,
                memory_mb: claim.memory_mb,
                image_pull_secret_name,
            };

            let workload_kind = if claim.run_type == RunType::Once {
                backend.create_job(&namespace, &spec).await.map(|()| ArtifactKind::Job)
            } else {
                backend.create_deployment(&namespace, &spec).await.map(|()| ArtifactKind::Deployment)
            };
            let workload_kind = match workload_kind {
                Ok(kind) => kind,
                Err(err) => {
                    self.rollback(&rollback_log).await;
                    return Err(err);
                }
            };
            rollback_log.push(RolledBackArtifact {
                zone: zone_name.clone(),
                kind: workload_kind,
                namespace: namespace.clone(),
                name: workload_name.clone(),
            });

            let host_ip = self.discover_node_ip(&backend, &namespace, &workload_name).await;
            self.store.set_container_node_ip(claim.id, &host_ip).await?;

            let mut allocated_ports = Vec::with_capacity(claim.target_ports.len());
            for target_port in &claim.target_ports {
                let public_port = match self.naming.allocate_port(claim.id).await {
                    Ok(port) => port,
                    Err(err) => {
                        self.rollback(&rollback_log).await;
                        return Err(err);
                    }
                };
                let service_name = templates::service_name(&claim.name, claim.id, *target_port);
                if let Err(err) = backend
                    .create_service(&namespace, &service_name, &workload_name, &host_ip, public_port, *target_port)
                    .await
                {
                    self.rollback(&rollback_log).await;
                    return Err(err);
                }
                rollback_log.push(RolledBackArtifact {
                    zone: zone_name.clone(),
                    kind: ArtifactKind::Service,
                    namespace: namespace.clone(),
                    name: service_name,
                });
                allocated_ports.push(public_port);
            }
            self.store.set_container_public_ports(claim.id, allocated_ports).await?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn prepare_image_pull_secret(
        &self,
        backend: &Arc<dyn ContainerBackend>,
        namespace: &str,
        claim: &ContainerClaim,
        image_pull_secret: Option<&ImagePullSecret>,
        recreate: bool,
        rollback_log: &mut Vec<RolledBackArtifact>,
        zone_name: &str,
    ) -> Result<Option<String>, CoreError> {
        let Some(ips) = image_pull_secret else {
            if recreate && claim.env_var_names.iter().any(|n| n == IMAGE_PULL_SECRET_ENV_NAME) {
                let secret_name = templates::secret_name(&claim.name, IMAGE_PULL_SECRET_ENV_NAME);
                if !backend.secret_exists(namespace, &secret_name).await? {
                    return Err(CoreError::backend(format!("recreate references missing image-pull secret '{secret_name}'")));
                }
                return Ok(Some(secret_name));
            }
            return Ok(None);
        };

        if ips.url.is_empty() {
            return Ok(None);
        }

        if recreate {
            let secret_name = templates::secret_name(&claim.name, IMAGE_PULL_SECRET_ENV_NAME);
            if !backend.secret_exists(namespace, &secret_name).await? {
                return Err(CoreError::backend(format!("recreate references missing image-pull secret '{secret_name}'")));
            }
            return Ok(Some(secret_name));
        }

        let secret_name = templates::secret_name(&claim.name, IMAGE_PULL_SECRET_ENV_NAME);
        let encoded = encode_image_pull_secret(&ips.url, ips.email.as_deref(), ips.username.as_deref(), ips.password.as_deref(), ips.token.as_deref());
        backend
            .create_secret(namespace, &secret_name, HashMap::from([(".dockerconfigjson".to_owned(), encoded)]))
            .await?;
        rollback_log.push(RolledBackArtifact {
            zone: zone_name.to_owned(),
            kind: ArtifactKind::Secret,
            namespace: namespace.to_owned(),
            name: secret_name.clone(),
        });
        Ok(Some(secret_name))
    }

    /// Polls for the pod's host ip once per `poll_interval`, up to `poll_attempts` times.
    /// Falls back to the zone's default routing ip if the pod vanishes, fails, or the poll
    /// budget runs out before an ip shows up.
    async fn discover_node_ip(&self, backend: &Arc<dyn ContainerBackend>, namespace: &str, workload_name: &str) -> String {
        for _ in 0..self.poll_attempts {
            match backend.observe_pod(namespace, workload_name).await {
                Ok(obs) if !obs.exists || obs.failed => break,
                Ok(obs) => {
                    if let Some(ip) = obs.host_ip {
                        return ip;
                    }
                }
                Err(_) => break,
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        backend.default_routing_ip().to_owned()
    }

    async fn rollback(&self, log: &[RolledBackArtifact]) {
        if log.is_empty() {
            return;
        }
        tracing::warn!(count = log.len(), "rolling back partially created container resources");
        for artifact in log.iter().rev() {
            let Ok(backend) = self.zones.container_backend(&artifact.zone) else {
                tracing::error!(zone = %artifact.zone, "cannot roll back, zone backend missing");
                continue;
            };
            let result = match artifact.kind {
                ArtifactKind::Secret => backend.delete_secret(&artifact.namespace, &artifact.name).await,
                ArtifactKind::Deployment => backend.delete_deployment(&artifact.namespace, &artifact.name).await,
                ArtifactKind::Job => backend.delete_job(&artifact.namespace, &artifact.name).await,
                ArtifactKind::Service => backend.delete_service(&artifact.namespace, &artifact.name).await,
            };
            if let Err(err) = result {
                tracing::error!(name = %artifact.name, error = %err, "failed to roll back artifact");
            }
        }
    }

    /// Tears a claim's workload down across its zones. Services and the deployment/job are
    /// always removed; env-var secrets are kept when `recreate` is set, since a re-run will
    /// reuse them. The claim row is always soft-deleted afterward — `recreate` only changes
    /// what happens on the backend, not whether this claim's lifetime has ended.
    pub async fn delete(&self, project: &project::Model, claim: &ContainerClaim, recreate: bool) -> Result<(), CoreError> {
        let namespace = templates::namespace_name(&project.name, project.id);
        let workload_name = Self::workload_name(claim);

        for zone_name in &claim.zones {
            let backend = self.zones.container_backend(zone_name)?;

            for target_port in &claim.target_ports {
                let service_name = templates::service_name(&claim.name, claim.id, *target_port);
                backend.delete_service(&namespace, &service_name).await?;
            }

            if !recreate {
                for env_var_name in &claim.env_var_names {
                    let secret_name = templates::secret_name(&claim.name, env_var_name);
                    backend.delete_secret(&namespace, &secret_name).await?;
                }
            }

            if claim.run_type == RunType::Once {
                backend.delete_job(&namespace, &workload_name).await?;
            } else {
                backend.delete_deployment(&namespace, &workload_name).await?;
            }
        }

        self.store.soft_delete_container_claim(claim.id).await?;
        Ok(())
    }

    /// Destroys and recreates a claim in place: the new row keeps the same spec and
    /// env-var *names*, but env-var values and any image-pull-secret have been forgotten,
    /// so the backend's pre-existing secrets are reused rather than recreated.
    pub async fn rerun(&self, project: &project::Model, claim: &ContainerClaim) -> Result<ContainerClaim, CoreError> {
        self.store.set_container_status(claim.id, ClaimStatus::Deactivating).await?;
        self.delete(project, claim, true).await?;

        let new_claim = self
            .store
            .insert_container_claim(NewContainerClaim {
                project_id: claim.project_id,
                creator_account_id: claim.creator_account_id,
                name: claim.name.clone(),
                image_ref: claim.image_ref.clone(),
                image_tag: claim.image_tag.clone(),
                command: claim.command.clone(),
                run_type: claim.run_type.clone(),
                target_ports: claim.target_ports.clone(),
                zones: claim.zones.clone(),
                env_var_names: claim.env_var_names.clone(),
                cpu_millicores: claim.cpu_millicores,
                memory_mb: claim.memory_mb,
            })
            .await?;

        self.create(project, &new_claim, &[], None, true).await?;
        Ok(new_claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_backends::InMemoryContainerBackend;
    use cp_store::SeaOrmStore;
    use cp_zones::{ContainerZoneConfig, ZoneRegistry};
    use std::collections::HashSet;

    async fn harness() -> (Arc<SeaOrmStore>, Arc<ZoneRegistry>, Arc<NamingService>, project::Model, ContainerReconciler) {
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
                &[],
                &*store,
            )
            .await
            .unwrap(),
        );
        let naming = Arc::new(NamingService::new(store.clone()));
        let reconciler = ContainerReconciler::new(store.clone(), zones.clone(), naming.clone());
        (store, zones, naming, project, reconciler)
    }

    fn backend_for(zones: &ZoneRegistry) -> Arc<dyn ContainerBackend> {
        zones.container_backend("zone-a").unwrap()
    }

    fn set_pod_host_ip(backend: &Arc<dyn ContainerBackend>, namespace: &str, workload_name: &str, host_ip: &str) {
        backend
            .as_any()
            .downcast_ref::<InMemoryContainerBackend>()
            .expect("test backend is InMemoryContainerBackend")
            .set_pod_host_ip(namespace, workload_name, host_ip);
    }

    #[tokio::test]
    async fn create_brings_up_workload_and_services_and_marks_active() {
        let (store, zones, _naming, project, reconciler) = harness().await;
        let claim = store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: 1,
                name: "svc".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![8080],
                zones: vec!["zone-a".into()],
                env_var_names: vec!["API_KEY".into()],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();

        let namespace = templates::namespace_name(&project.name, project.id);
        let workload_name = templates::deployment_name(&claim.name, claim.id);
        let backend = backend_for(&zones);
        set_pod_host_ip(&backend, &namespace, &workload_name, "10.1.1.5");

        reconciler
            .create(
                &project,
                &claim,
                &[EnvVar { name: "API_KEY".into(), value: "secret-value".into() }],
                None,
                false,
            )
            .await
            .unwrap();

        let reloaded = store.get_container_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.status, ClaimStatus::Active);
        assert_eq!(reloaded.node_ip.as_deref(), Some("10.1.1.5"));
        assert_eq!(reloaded.public_ports.len(), 1);
    }

    #[tokio::test]
    async fn failed_deployment_rolls_back_the_secret_and_marks_error() {
        let (store, zones, _naming, project, reconciler) = harness().await;
        let claim = store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: 1,
                name: "broken".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![],
                zones: vec!["zone-a".into(), "zone-missing".into()],
                env_var_names: vec!["API_KEY".into()],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();

        let err = reconciler
            .create(&project, &claim, &[EnvVar { name: "API_KEY".into(), value: "x".into() }], None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let reloaded = store.get_container_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.status, ClaimStatus::Error);

        let namespace = templates::namespace_name(&project.name, project.id);
        let secret_name = templates::secret_name(&claim.name, "API_KEY");
        let backend = backend_for(&zones);
        assert!(!backend.secret_exists(&namespace, &secret_name).await.unwrap());
    }

    #[tokio::test]
    async fn rerun_preserves_env_var_names_and_reuses_existing_secrets() {
        let (store, zones, _naming, project, reconciler) = harness().await;
        let claim = store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: 1,
                name: "svc".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![8080],
                zones: vec!["zone-a".into()],
                env_var_names: vec!["API_KEY".into(), "image-pull-secret".into()],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();

        let namespace = templates::namespace_name(&project.name, project.id);
        let original_workload_name = templates::deployment_name(&claim.name, claim.id);
        let backend = backend_for(&zones);
        set_pod_host_ip(&backend, &namespace, &original_workload_name, "10.1.1.5");
        reconciler
            .create(
                &project,
                &claim,
                &[EnvVar { name: "API_KEY".into(), value: "secret-value".into() }],
                Some(&ImagePullSecret { url: "registry.example.com".into(), token: Some("tok".into()), ..Default::default() }),
                false,
            )
            .await
            .unwrap();

        let new_workload_name_guess = format!("deployment-{}-{}", claim.name, claim.id + 1);
        set_pod_host_ip(&backend, &namespace, &new_workload_name_guess, "10.1.1.6");

        let new_claim = reconciler.rerun(&project, &claim).await.unwrap();
        assert_ne!(new_claim.id, claim.id);
        assert_eq!(
            new_claim.env_var_names.iter().collect::<HashSet<_>>(),
            claim.env_var_names.iter().collect::<HashSet<_>>()
        );
        assert_eq!(new_claim.status, ClaimStatus::Active);

        let api_key_secret = templates::secret_name(&claim.name, "API_KEY");
        let ips_secret = templates::secret_name(&claim.name, "image-pull-secret");
        assert!(backend.secret_exists(&namespace, &api_key_secret).await.unwrap());
        assert!(backend.secret_exists(&namespace, &ips_secret).await.unwrap());
    }
}
