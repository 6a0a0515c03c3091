//! The authoritative store: the durable record of accounts, projects, claims, usage
//! counters and sessions that every other control-plane component reads and writes through.

pub mod entity;
pub mod migration;
mod repo;
mod sea_orm_store;

pub use repo::{AuthoritativeStore, NewContainerClaim};
pub use sea_orm_store::SeaOrmStore;

#[cfg(test)]
mod tests {
    use super::*;
    use entity::container_claim::RunType;
    use entity::container_zone;

    async fn fresh_store() -> SeaOrmStore {
        let store = SeaOrmStore::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_project_inserts_membership_and_billing_row() {
        let store = fresh_store().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store
            .create_project_for_account(account.id, "demo", "a demo project")
            .await
            .unwrap();
        assert!(store.is_member(project.id, account.id).await.unwrap());
    }

    #[tokio::test]
    async fn add_member_by_unknown_username_fails() {
        let store = fresh_store().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store
            .create_project_for_account(account.id, "demo", "a demo project")
            .await
            .unwrap();
        let err = store.add_member_by_username(project.id, "ghost").await.unwrap_err();
        assert!(matches!(err, cp_errors::CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn colliding_claim_names_are_tightened_to_exact_or_numeric_suffix() {
        let store = fresh_store().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store.create_project_for_account(account.id, "demo", "").await.unwrap();

        store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: account.id,
                name: "svc".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![80],
                zones: vec!["zone-a".into()],
                env_var_names: vec![],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();

        // "svc-other" shares a prefix with "svc" but is not "svc" or "svc-<digits>", so it must
        // not be treated as a collision.
        store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: account.id,
                name: "svc-other".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![],
                zones: vec!["zone-a".into()],
                env_var_names: vec![],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();

        let collisions = store.find_colliding_claim_names(project.id, "svc").await.unwrap();
        assert_eq!(collisions, vec!["svc".to_owned()]);
    }

    #[tokio::test]
    async fn usage_counter_clamps_to_zero_on_underflow() {
        let store = fresh_store().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        store
            .upsert_container_zone(container_zone::Model {
                name: "zone-a".into(),
                default_routing_ip: "10.0.0.1".into(),
                cpu_millicores: 4000,
                memory_mb: 8192,
            })
            .await
            .unwrap();
        store.add_usage(account.id, "zone-a", 100, 256).await.unwrap();
        store.subtract_usage_clamped(account.id, "zone-a", 500, 1000).await.unwrap();
        let usage = store.get_usage(account.id, "zone-a").await.unwrap();
        assert_eq!(usage.used_cpu_millicores, 0);
        assert_eq!(usage.used_memory_mb, 0);
    }

    #[tokio::test]
    async fn port_reservation_rejects_duplicates_across_claims() {
        let store = fresh_store().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store.create_project_for_account(account.id, "demo", "").await.unwrap();
        let claim_a = store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: account.id,
                name: "a".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![80],
                zones: vec!["zone-a".into()],
                env_var_names: vec![],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();
        let claim_b = store
            .insert_container_claim(NewContainerClaim {
                project_id: project.id,
                creator_account_id: account.id,
                name: "b".into(),
                image_ref: "nginx".into(),
                image_tag: "latest".into(),
                command: vec![],
                run_type: RunType::Permanent,
                target_ports: vec![80],
                zones: vec!["zone-a".into()],
                env_var_names: vec![],
                cpu_millicores: 100,
                memory_mb: 256,
            })
            .await
            .unwrap();

        assert!(store.try_reserve_port(claim_a.id, 12345).await.unwrap());
        assert!(!store.try_reserve_port(claim_b.id, 12345).await.unwrap());
    }
}
