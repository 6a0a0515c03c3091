use std::sync::Arc;
use std::time::Duration;

use cp_orchestrator::ClaimOrchestrator;
use cp_store::AuthoritativeStore;
use cp_zones::ZoneRegistry;

/// Shared handles every route handler needs. Cloned per-request by axum's `State`
/// extractor; every field is itself an `Arc`, so the clone is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthoritativeStore>,
    pub zones: Arc<ZoneRegistry>,
    pub orchestrator: Arc<ClaimOrchestrator>,
    pub shutdown_timeout: Duration,
}
