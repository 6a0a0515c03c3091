//! Quota engine: decides whether a new claim fits an account's fair share in each of its
//! requested zones, and keeps the per-account-per-zone usage counters in step with claim
//! status transitions.

use std::sync::Arc;

use cp_errors::CoreError;
use cp_store::AuthoritativeStore;

pub struct QuotaEngine {
    store: Arc<dyn AuthoritativeStore>,
}

impl QuotaEngine {
    #[must_use]
    pub fn new(store: Arc<dyn AuthoritativeStore>) -> Self {
        Self { store }
    }

    /// Fair share is `zoneCapacity / activeAccountCount`. Admission requires
    /// `used + requested <= fairShare` for both cpu and memory, in every requested zone.
    /// Does not mutate anything; the caller adds usage only once the claim actually reaches
    /// `active` (see [`QuotaEngine::commit`]).
    pub async fn check_admission(
        &self,
        account_id: i64,
        zones: &[String],
        cpu_millicores: i32,
        memory_mb: i32,
    ) -> Result<(), CoreError> {
        let active_accounts = self.store.active_account_count().await?.max(1);

        for zone in zones {
            let capacity = self.store.get_container_zone(zone).await?;
            let fair_share_cpu = capacity.cpu_millicores / i32::try_from(active_accounts).unwrap_or(i32::MAX);
            let fair_share_mem = capacity.memory_mb / i32::try_from(active_accounts).unwrap_or(i32::MAX);

            let used = self.store.get_usage(account_id, zone).await?;
            if used.used_cpu_millicores + cpu_millicores > fair_share_cpu {
                return Err(CoreError::QuotaExceeded(format!(
                    "zone '{zone}': {} + {cpu_millicores} millicores would exceed fair share of {fair_share_cpu}",
                    used.used_cpu_millicores
                )));
            }
            if used.used_memory_mb + memory_mb > fair_share_mem {
                return Err(CoreError::QuotaExceeded(format!(
                    "zone '{zone}': {} + {memory_mb} MiB would exceed fair share of {fair_share_mem}",
                    used.used_memory_mb
                )));
            }
        }
        Ok(())
    }

    /// Adds usage in every zone; called when a claim's status transitions into `active`.
    pub async fn commit(&self, account_id: i64, zones: &[String], cpu_millicores: i32, memory_mb: i32) -> Result<(), CoreError> {
        for zone in zones {
            self.store.add_usage(account_id, zone, cpu_millicores, memory_mb).await?;
        }
        Ok(())
    }

    /// Releases usage in every zone, clamped to zero; called when a claim's status
    /// transitions into `deactivating`.
    pub async fn release(&self, account_id: i64, zones: &[String], cpu_millicores: i32, memory_mb: i32) -> Result<(), CoreError> {
        for zone in zones {
            self.store.subtract_usage_clamped(account_id, zone, cpu_millicores, memory_mb).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_store::SeaOrmStore;
    use cp_store::entity::container_zone;

    async fn one_account_zone(cpu: i32, mem: i32) -> (Arc<SeaOrmStore>, i64) {
        let store = Arc::new(SeaOrmStore::connect("sqlite::memory:").await.unwrap());
        store.migrate().await.unwrap();
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        store
            .upsert_container_zone(container_zone::Model {
                name: "zone-a".into(),
                default_routing_ip: "10.0.0.1".into(),
                cpu_millicores: cpu,
                memory_mb: mem,
            })
            .await
            .unwrap();
        (store, account.id)
    }

    #[tokio::test]
    async fn admits_within_fair_share_and_rejects_beyond_it() {
        let (store, account_id) = one_account_zone(1000, 2048).await;
        let quota = QuotaEngine::new(store.clone());
        let zones = vec!["zone-a".to_owned()];

        quota.check_admission(account_id, &zones, 800, 1024).await.unwrap();
        quota.commit(account_id, &zones, 800, 1024).await.unwrap();

        let err = quota.check_admission(account_id, &zones, 300, 100).await.unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn release_returns_usage_to_pre_create_value() {
        let (store, account_id) = one_account_zone(1000, 2048).await;
        let quota = QuotaEngine::new(store.clone());
        let zones = vec!["zone-a".to_owned()];

        quota.commit(account_id, &zones, 800, 1024).await.unwrap();
        quota.release(account_id, &zones, 800, 1024).await.unwrap();

        let usage = store.get_usage(account_id, "zone-a").await.unwrap();
        assert_eq!(usage.used_cpu_millicores, 0);
        assert_eq!(usage.used_memory_mb, 0);
    }

    #[tokio::test]
    async fn fair_share_divides_capacity_by_active_account_count() {
        let (store, account_a) = one_account_zone(1000, 2048).await;
        let account_b = store.create_account("grace", "grace@example.com").await.unwrap();
        let quota = QuotaEngine::new(store.clone());
        let zones = vec!["zone-a".to_owned()];

        // capacity 1000 / 2 active accounts = 500 fair share each.
        quota.check_admission(account_a, &zones, 500, 0).await.unwrap();
        let err = quota.check_admission(account_b.id, &zones, 600, 0).await.unwrap_err();
        assert!(matches!(err, CoreError::QuotaExceeded(_)));
    }
}
