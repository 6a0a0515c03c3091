//! Naming & port allocator: derived name templates, claim-name uniqueness rewriting and
//! the public-port allocator.

pub mod templates;

use std::sync::Arc;

use cp_errors::CoreError;
use cp_store::AuthoritativeStore;

const PORT_RANGE_START: i32 = 10000;
const PORT_RANGE_END: i32 = 60000; // exclusive
const PORT_ALLOCATION_ATTEMPTS: u32 = 100;

pub struct NamingService {
    store: Arc<dyn AuthoritativeStore>,
}

impl NamingService {
    #[must_use]
    pub fn new(store: Arc<dyn AuthoritativeStore>) -> Self {
        Self { store }
    }

    /// Resolves a unique container-claim name within `project_id`.
    ///
    /// Collisions are restricted to an exact match or `{name}-<digits>` (not a raw prefix
    /// match, which would also catch unrelated claims that merely share a prefix). Of the
    /// colliding names, the most recently created one drives the rewrite: exact match gets
    /// `-1` appended; `{name}-<n>` becomes `{name}-<n+1>`.
    pub async fn resolve_unique_claim_name(&self, project_id: i64, requested_name: &str) -> Result<String, CoreError> {
        let collisions = self.store.find_colliding_claim_names(project_id, requested_name).await?;
        let Some(most_recent) = collisions.first() else {
            return Ok(requested_name.to_owned());
        };

        if most_recent == requested_name {
            return Ok(format!("{requested_name}-1"));
        }

        let suffix = most_recent
            .strip_prefix(&format!("{requested_name}-"))
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(format!("{requested_name}-{}", suffix + 1))
    }

    /// Allocates one free public port for `claim_id` in `[10000, 60000)`.
    ///
    /// Keeps drawing candidates while they're taken, accepts the first free one, and only
    /// fails once every attempt in the budget has collided.
    pub async fn allocate_port(&self, claim_id: i64) -> Result<i32, CoreError> {
        use rand::Rng;
        let mut rng = rand::rng();

        for _ in 0..PORT_ALLOCATION_ATTEMPTS {
            let candidate = rng.random_range(PORT_RANGE_START..PORT_RANGE_END);
            if self.store.try_reserve_port(claim_id, candidate).await? {
                return Ok(candidate);
            }
        }
        Err(CoreError::backend(format!(
            "exhausted {PORT_ALLOCATION_ATTEMPTS} attempts allocating a public port"
        )))
    }

    /// Allocates one public port per target port, preserving target-port order.
    pub async fn allocate_ports(&self, claim_id: i64, target_ports: &[i32]) -> Result<Vec<i32>, CoreError> {
        let mut allocated = Vec::with_capacity(target_ports.len());
        for _ in target_ports {
            allocated.push(self.allocate_port(claim_id).await?);
        }
        Ok(allocated)
    }
}
