//! The zone registry: the in-memory catalog of container-zone and db-zone backends,
//! seeded from configuration at boot and mirrored into the authoritative store so claim
//! rows can reference zones by name with a working foreign key.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use cp_backends::{ContainerBackend, DbBackend, InMemoryContainerBackend, InMemoryDbBackend};
use cp_errors::CoreError;
use cp_store::AuthoritativeStore;
use cp_store::entity::{container_zone, db_zone};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ContainerZoneConfig {
    pub name: String,
    pub default_routing_ip: String,
    pub cpu_millicores: i32,
    pub memory_mb: i32,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DbZoneConfig {
    pub name: String,
    pub connection_url: String,
}

/// Live catalog of backend handles, keyed by zone name. Established once at boot;
/// read-mostly afterward, so an `RwLock` over a plain `HashMap` is enough.
pub struct ZoneRegistry {
    container_backends: RwLock<HashMap<String, Arc<dyn ContainerBackend>>>,
    db_backends: RwLock<HashMap<String, Arc<dyn DbBackend>>>,
}

impl ZoneRegistry {
    /// Connects to every configured zone and mirrors its row into the authoritative
    /// store. Connection failure for any zone is fatal at boot, same as the backend it
    /// replaces: a control plane that can't reach a configured zone shouldn't start.
    pub async fn bootstrap(
        container_zones: &[ContainerZoneConfig],
        db_zones: &[DbZoneConfig],
        store: &dyn AuthoritativeStore,
    ) -> Result<Self, CoreError> {
        let registry = Self {
            container_backends: RwLock::new(HashMap::new()),
            db_backends: RwLock::new(HashMap::new()),
        };

        for zone in container_zones {
            tracing::info!(zone = %zone.name, "connecting container zone");
            let backend: Arc<dyn ContainerBackend> =
                Arc::new(InMemoryContainerBackend::new(&zone.name, &zone.default_routing_ip));
            registry
                .container_backends
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(zone.name.clone(), backend);
            store
                .upsert_container_zone(container_zone::Model {
                    name: zone.name.clone(),
                    default_routing_ip: zone.default_routing_ip.clone(),
                    cpu_millicores: zone.cpu_millicores,
                    memory_mb: zone.memory_mb,
                })
                .await?;
        }

        for zone in db_zones {
            tracing::info!(zone = %zone.name, "connecting db zone");
            let backend: Arc<dyn DbBackend> = Arc::new(InMemoryDbBackend::new(&zone.name));
            registry
                .db_backends
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(zone.name.clone(), backend);
            store
                .upsert_db_zone(db_zone::Model {
                    name: zone.name.clone(),
                    connection_url: zone.connection_url.clone(),
                })
                .await?;
        }

        Ok(registry)
    }

    pub fn container_backend(&self, zone: &str) -> Result<Arc<dyn ContainerBackend>, CoreError> {
        self.container_backends
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(zone)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("container zone '{zone}'")))
    }

    pub fn db_backend(&self, zone: &str) -> Result<Arc<dyn DbBackend>, CoreError> {
        self.db_backends
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(zone)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("db zone '{zone}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_store::SeaOrmStore;

    async fn fresh_store() -> SeaOrmStore {
        let store = SeaOrmStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn bootstrap_mirrors_zones_into_store() {
        let store = fresh_store().await;
        let registry = ZoneRegistry::bootstrap(
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
            &store,
        )
        .await
        .unwrap();

        assert!(registry.container_backend("zone-a").is_ok());
        assert!(registry.db_backend("dbzone-a").is_ok());
        assert!(registry.container_backend("zone-missing").is_err());

        let zones = store.list_container_zones().await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].cpu_millicores, 4000);
    }
}
