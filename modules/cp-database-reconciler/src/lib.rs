//! Database reconciler: brings a database claim's database and users up and down against
//! its zones' db backends. No compensation log — a mid-way failure just leaves the claim
//! in `error` for the caller to retry or tear down by hand.

use std::sync::Arc;

use cp_backends::random_db_password;
use cp_errors::CoreError;
use cp_naming::templates;
use cp_store::AuthoritativeStore;
use cp_store::entity::container_claim::ClaimStatus;
use cp_store::entity::database_claim::{DbCredential, Model as DatabaseClaim};
use cp_zones::ZoneRegistry;

pub struct DatabaseReconciler {
    store: Arc<dyn AuthoritativeStore>,
    zones: Arc<ZoneRegistry>,
}

impl DatabaseReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn AuthoritativeStore>, zones: Arc<ZoneRegistry>) -> Self {
        Self { store, zones }
    }

    /// Creates the database on every zone the claim targets and issues one RW user,
    /// crediting the claim's `credentials` list in the authoritative store.
    pub async fn create(&self, claim: &DatabaseClaim) -> Result<(), CoreError> {
        self.store.set_database_status(claim.id, ClaimStatus::Activating).await?;

        match self.create_inner(claim).await {
            Ok(()) => {
                self.store.set_database_status(claim.id, ClaimStatus::Active).await?;
                Ok(())
            }
            Err(err) => {
                tracing::error!(claim_id = claim.id, error = %err, "database create failed");
                self.store.set_database_status(claim.id, ClaimStatus::Error).await?;
                Err(err)
            }
        }
    }

    async fn create_inner(&self, claim: &DatabaseClaim) -> Result<(), CoreError> {
        for zone in &claim.zones {
            let backend = self.zones.db_backend(zone)?;
            backend.create_database(&claim.database_name).await?;
        }
        let rw_user = templates::rw_user_name(&claim.database_name);
        self.add_user(claim, &rw_user, "rw").await?;
        Ok(())
    }

    /// Issues a further user against every zone the claim targets, appending its
    /// credential to the claim's `credentials` list. Used both for the initial RW user at
    /// create time and for ad-hoc additional users requested later.
    pub async fn add_user(&self, claim: &DatabaseClaim, username: &str, access_control_type: &str) -> Result<DbCredential, CoreError> {
        let password = random_db_password();
        for zone in &claim.zones {
            let backend = self.zones.db_backend(zone)?;
            backend.create_user(&claim.database_name, username, &password).await?;
        }
        let credential = DbCredential {
            username: username.to_owned(),
            password,
            access_control_type: access_control_type.to_owned(),
        };
        self.store.append_database_credential(claim.id, credential.clone()).await?;
        Ok(credential)
    }

    /// Drops every issued user, then the database itself, on every targeted zone, and
    /// soft-deletes the claim row.
    pub async fn delete(&self, claim: &DatabaseClaim) -> Result<(), CoreError> {
        self.store.set_database_status(claim.id, ClaimStatus::Deactivating).await?;

        for zone in &claim.zones {
            let backend = self.zones.db_backend(zone)?;
            for credential in &claim.credentials {
                backend.drop_user(&claim.database_name, &credential.username).await?;
            }
            backend.drop_database(&claim.database_name).await?;
        }

        self.store.soft_delete_database_claim(claim.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_backends::InMemoryDbBackend;
    use cp_store::SeaOrmStore;
    use cp_zones::{DbZoneConfig, ZoneRegistry};

    async fn harness() -> (Arc<SeaOrmStore>, Arc<ZoneRegistry>, DatabaseReconciler) {
        let store = Arc::new(SeaOrmStore::connect("sqlite::memory:").await.unwrap());
        store.migrate().await.unwrap();
        let zones = Arc::new(
            ZoneRegistry::bootstrap(
                &[],
                &[DbZoneConfig {
                    name: "dbzone-a".into(),
                    connection_url: "postgres://admin@localhost/admin".into(),
                }],
                &*store,
            )
            .await
            .unwrap(),
        );
        let reconciler = DatabaseReconciler::new(store.clone(), zones.clone());
        (store, zones, reconciler)
    }

    fn backend_for(zones: &ZoneRegistry) -> Arc<dyn cp_backends::DbBackend> {
        zones.db_backend("dbzone-a").unwrap()
    }

    #[tokio::test]
    async fn create_issues_rw_user_and_marks_active() {
        let (store, zones, reconciler) = harness().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store.create_project_for_account(account.id, "demo", "").await.unwrap();
        let database_name = templates::database_name(&project.name, project.id);
        let claim = store
            .insert_database_claim(project.id, vec!["dbzone-a".into()], database_name.clone())
            .await
            .unwrap();

        reconciler.create(&claim).await.unwrap();

        let reloaded = store.get_database_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.status, ClaimStatus::Active);
        assert_eq!(reloaded.credentials.len(), 1);
        assert_eq!(reloaded.credentials[0].access_control_type, "rw");

        let backend = backend_for(&zones);
        assert!(has_database(&backend, &database_name));
    }

    fn has_database(backend: &Arc<dyn cp_backends::DbBackend>, database_name: &str) -> bool {
        backend
            .as_any()
            .downcast_ref::<InMemoryDbBackend>()
            .expect("test backend is InMemoryDbBackend")
            .has_database(database_name)
    }

    #[tokio::test]
    async fn add_user_appends_to_credentials_without_disturbing_the_first() {
        let (store, _zones, reconciler) = harness().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store.create_project_for_account(account.id, "demo", "").await.unwrap();
        let database_name = templates::database_name(&project.name, project.id);
        let claim = store
            .insert_database_claim(project.id, vec!["dbzone-a".into()], database_name)
            .await
            .unwrap();
        reconciler.create(&claim).await.unwrap();
        let claim = store.get_database_claim(claim.id).await.unwrap();

        reconciler.add_user(&claim, "readonly_bot", "ro").await.unwrap();

        let reloaded = store.get_database_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.credentials.len(), 2);
        assert!(reloaded.credentials.iter().any(|c| c.username == "readonly_bot" && c.access_control_type == "ro"));
    }

    #[tokio::test]
    async fn delete_drops_all_issued_users_and_the_database() {
        let (store, zones, reconciler) = harness().await;
        let account = store.create_account("ada", "ada@example.com").await.unwrap();
        let project = store.create_project_for_account(account.id, "demo", "").await.unwrap();
        let database_name = templates::database_name(&project.name, project.id);
        let claim = store
            .insert_database_claim(project.id, vec!["dbzone-a".into()], database_name.clone())
            .await
            .unwrap();
        reconciler.create(&claim).await.unwrap();
        let claim = store.get_database_claim(claim.id).await.unwrap();

        reconciler.delete(&claim).await.unwrap();

        let backend = backend_for(&zones);
        assert!(!has_database(&backend, &database_name));
        let reloaded = store.get_database_claim(claim.id).await.unwrap();
        assert_eq!(reloaded.status, ClaimStatus::Inactive);
        assert!(reloaded.deleted_at.is_some());
    }
}
