use std::collections::HashMap;

use async_trait::async_trait;
use cp_errors::CoreError;

/// Everything the container reconciler needs to bring up one workload on one zone.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub name: String,
    pub image_ref: String,
    pub image_tag: String,
    pub command: Vec<String>,
    /// Names of secrets to project as environment variables, keyed by the secret's own name.
    pub env_secret_names: Vec<String>,
    pub target_ports: Vec<i32>,
    pub cpu_millicores: i32,
    pub memory_mb: i32,
    pub image_pull_secret_name: Option<String>,
}

/// Observed state of the pod backing a workload, used by the node-ip discovery poll.
#[derive(Debug, Clone, Default)]
pub struct PodObservation {
    pub exists: bool,
    pub host_ip: Option<String>,
    pub failed: bool,
}

/// Async client for one container-zone backend (a Kubernetes-like orchestrator).
///
/// One instance per zone; `cp-zones` holds one behind an `Arc<dyn ContainerBackend>` per
/// registered zone.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    fn zone_name(&self) -> &str;
    fn default_routing_ip(&self) -> &str;

    /// Lets tests downcast to a specific backend (e.g. `InMemoryContainerBackend`) to seed
    /// white-box state such as a pod's host ip.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Idempotent: pre-existing namespace/limit-range is not an error.
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), CoreError>;
    async fn ensure_default_limit_range(&self, namespace: &str) -> Result<(), CoreError>;

    async fn create_secret(&self, namespace: &str, name: &str, data: HashMap<String, String>) -> Result<(), CoreError>;
    async fn secret_exists(&self, namespace: &str, name: &str) -> Result<bool, CoreError>;
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), CoreError>;

    async fn create_deployment(&self, namespace: &str, spec: &WorkloadSpec) -> Result<(), CoreError>;
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), CoreError>;

    async fn create_job(&self, namespace: &str, spec: &WorkloadSpec) -> Result<(), CoreError>;
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), CoreError>;

    /// Looks up the (at most one, in this reference backend) pod selected by `workload_name`.
    async fn observe_pod(&self, namespace: &str, workload_name: &str) -> Result<PodObservation, CoreError>;

    async fn create_service(
        &self,
        namespace: &str,
        name: &str,
        workload_name: &str,
        external_ip: &str,
        public_port: i32,
        target_port: i32,
    ) -> Result<(), CoreError>;
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), CoreError>;

    async fn pod_logs(&self, namespace: &str, workload_name: &str) -> Result<String, CoreError>;
}

/// Docker config secret encoding, mirroring the three observed shapes: token-only,
/// username+password-only (base64'd into `auth`), and both present (token wins).
#[must_use]
pub fn encode_image_pull_secret(
    registry_url: &str,
    email: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
    token: Option<&str>,
) -> String {
    use base64::Engine;

    let auth = if let Some(tok) = token.filter(|t| !t.is_empty()) {
        tok.to_owned()
    } else if let (Some(user), Some(pass)) = (username.filter(|u| !u.is_empty()), password.filter(|p| !p.is_empty())) {
        base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"))
    } else {
        String::new()
    };

    let mut entry = serde_json::json!({ "auth": auth });
    if let Some(e) = email.filter(|e| !e.is_empty()) {
        entry["email"] = serde_json::Value::String(e.to_owned());
    }
    if let Some(user) = username.filter(|u| !u.is_empty()) {
        entry["username"] = serde_json::Value::String(user.to_owned());
    }
    if let Some(pass) = password.filter(|p| !p.is_empty()) {
        entry["password"] = serde_json::Value::String(pass.to_owned());
    }

    serde_json::json!({ "auths": { registry_url: entry } }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_only_uses_token_as_auth() {
        let cfg = encode_image_pull_secret("registry.example.com", None, None, None, Some("tok123"));
        let v: serde_json::Value = serde_json::from_str(&cfg).unwrap();
        assert_eq!(v["auths"]["registry.example.com"]["auth"], "tok123");
    }

    #[test]
    fn user_pass_only_base64_encodes_auth() {
        use base64::Engine;
        let cfg = encode_image_pull_secret("registry.example.com", None, Some("bob"), Some("hunter2"), None);
        let v: serde_json::Value = serde_json::from_str(&cfg).unwrap();
        let expected = base64::engine::general_purpose::STANDARD.encode("bob:hunter2");
        assert_eq!(v["auths"]["registry.example.com"]["auth"], expected);
    }

    #[test]
    fn token_wins_over_user_pass_when_both_present() {
        let cfg = encode_image_pull_secret("registry.example.com", None, Some("bob"), Some("hunter2"), Some("tok123"));
        let v: serde_json::Value = serde_json::from_str(&cfg).unwrap();
        assert_eq!(v["auths"]["registry.example.com"]["auth"], "tok123");
    }
}
