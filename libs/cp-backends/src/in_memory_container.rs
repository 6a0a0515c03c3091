use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use cp_errors::CoreError;
use parking_lot::Mutex;

use crate::container::{ContainerBackend, PodObservation, WorkloadSpec};

#[derive(Default)]
struct State {
    namespaces: HashSet<String>,
    limit_ranges: HashSet<String>,
    secrets: HashMap<(String, String), HashMap<String, String>>,
    deployments: HashMap<(String, String), WorkloadSpec>,
    jobs: HashMap<(String, String), WorkloadSpec>,
    services: HashMap<(String, String), (String, i32, i32)>,
}

/// In-process stand-in for a real container-zone backend. The real clusters are not yet
/// implemented (same status as the object-storage provisioner); this reference
/// implementation is exercised by the reconciler's tests against the same trait a live
/// client would satisfy.
pub struct InMemoryContainerBackend {
    zone: String,
    default_routing_ip: String,
    state: Mutex<State>,
}

impl InMemoryContainerBackend {
    #[must_use]
    pub fn new(zone: impl Into<String>, default_routing_ip: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            default_routing_ip: default_routing_ip.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Test/demo hook: makes the next `observe_pod` call report a host ip immediately
    /// instead of requiring the reconciler to poll.
    pub fn set_pod_host_ip(&self, namespace: &str, workload_name: &str, host_ip: &str) {
        self.state
            .lock()
            .services
            .insert((namespace.to_owned(), format!("__podip__{workload_name}")), (host_ip.to_owned(), 0, 0));
    }
}

#[async_trait]
impl ContainerBackend for InMemoryContainerBackend {
    fn zone_name(&self) -> &str {
        &self.zone
    }

    fn default_routing_ip(&self) -> &str {
        &self.default_routing_ip
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), CoreError> {
        self.state.lock().namespaces.insert(namespace.to_owned());
        Ok(())
    }

    async fn ensure_default_limit_range(&self, namespace: &str) -> Result<(), CoreError> {
        self.state.lock().limit_ranges.insert(namespace.to_owned());
        Ok(())
    }

    async fn create_secret(&self, namespace: &str, name: &str, data: HashMap<String, String>) -> Result<(), CoreError> {
        self.state.lock().secrets.insert((namespace.to_owned(), name.to_owned()), data);
        Ok(())
    }

    async fn secret_exists(&self, namespace: &str, name: &str) -> Result<bool, CoreError> {
        Ok(self.state.lock().secrets.contains_key(&(namespace.to_owned(), name.to_owned())))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), CoreError> {
        self.state.lock().secrets.remove(&(namespace.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn create_deployment(&self, namespace: &str, spec: &WorkloadSpec) -> Result<(), CoreError> {
        self.state
            .lock()
            .deployments
            .insert((namespace.to_owned(), spec.name.clone()), spec.clone());
        Ok(())
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), CoreError> {
        self.state.lock().deployments.remove(&(namespace.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn create_job(&self, namespace: &str, spec: &WorkloadSpec) -> Result<(), CoreError> {
        self.state.lock().jobs.insert((namespace.to_owned(), spec.name.clone()), spec.clone());
        Ok(())
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), CoreError> {
        self.state.lock().jobs.remove(&(namespace.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn observe_pod(&self, namespace: &str, workload_name: &str) -> Result<PodObservation, CoreError> {
        let state = self.state.lock();
        let exists = state.deployments.contains_key(&(namespace.to_owned(), workload_name.to_owned()))
            || state.jobs.contains_key(&(namespace.to_owned(), workload_name.to_owned()));
        let host_ip = state
            .services
            .get(&(namespace.to_owned(), format!("__podip__{workload_name}")))
            .map(|(ip, _, _)| ip.clone());
        Ok(PodObservation {
            exists,
            host_ip,
            failed: false,
        })
    }

    async fn create_service(
        &self,
        namespace: &str,
        name: &str,
        workload_name: &str,
        external_ip: &str,
        public_port: i32,
        target_port: i32,
    ) -> Result<(), CoreError> {
        let _ = workload_name;
        self.state
            .lock()
            .services
            .insert((namespace.to_owned(), name.to_owned()), (external_ip.to_owned(), public_port, target_port));
        Ok(())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), CoreError> {
        self.state.lock().services.remove(&(namespace.to_owned(), name.to_owned()));
        Ok(())
    }

    async fn pod_logs(&self, namespace: &str, workload_name: &str) -> Result<String, CoreError> {
        let exists = self.observe_pod(namespace, workload_name).await?.exists;
        if !exists {
            return Err(CoreError::not_found(format!("pod for {workload_name}")));
        }
        Ok(format!("-- no log lines for {workload_name} yet --"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn namespace_creation_is_idempotent() {
        let backend = InMemoryContainerBackend::new("zone-a", "10.0.0.1");
        backend.ensure_namespace("ns-1").await.unwrap();
        backend.ensure_namespace("ns-1").await.unwrap();
        assert_eq!(backend.state.lock().namespaces.len(), 1);
    }

    #[tokio::test]
    async fn observe_pod_reports_host_ip_once_set() {
        let backend = InMemoryContainerBackend::new("zone-a", "10.0.0.1");
        backend
            .create_deployment(
                "ns-1",
                &WorkloadSpec {
                    name: "deployment-svc-1".into(),
                    image_ref: "nginx".into(),
                    image_tag: "latest".into(),
                    command: vec![],
                    env_secret_names: vec![],
                    target_ports: vec![8080],
                    cpu_millicores: 100,
                    memory_mb: 256,
                    image_pull_secret_name: None,
                },
            )
            .await
            .unwrap();
        let before = backend.observe_pod("ns-1", "deployment-svc-1").await.unwrap();
        assert!(before.exists);
        assert!(before.host_ip.is_none());

        backend.set_pod_host_ip("ns-1", "deployment-svc-1", "10.1.1.5");
        let after = backend.observe_pod("ns-1", "deployment-svc-1").await.unwrap();
        assert_eq!(after.host_ip.as_deref(), Some("10.1.1.5"));
    }
}
