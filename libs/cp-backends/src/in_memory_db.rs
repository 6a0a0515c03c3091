use std::collections::HashSet;

use async_trait::async_trait;
use cp_errors::CoreError;
use parking_lot::Mutex;

use crate::db::DbBackend;

#[derive(Default)]
struct State {
    databases: HashSet<String>,
    users: HashSet<(String, String)>,
}

/// In-process stand-in for a real db-zone backend, exercised by the database reconciler's
/// tests against the same trait a live Postgres-speaking client would satisfy.
pub struct InMemoryDbBackend {
    zone: String,
    state: Mutex<State>,
}

impl InMemoryDbBackend {
    #[must_use]
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            state: Mutex::new(State::default()),
        }
    }

    #[must_use]
    pub fn has_database(&self, name: &str) -> bool {
        self.state.lock().databases.contains(name)
    }

    #[must_use]
    pub fn has_user(&self, database: &str, username: &str) -> bool {
        self.state.lock().users.contains(&(database.to_owned(), username.to_owned()))
    }
}

#[async_trait]
impl DbBackend for InMemoryDbBackend {
    fn zone_name(&self) -> &str {
        &self.zone
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn create_database(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        if !state.databases.insert(name.to_owned()) {
            return Err(CoreError::conflict(format!("database '{name}' already exists")));
        }
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.databases.remove(name);
        state.users.retain(|(db, _)| db != name);
        Ok(())
    }

    async fn create_user(&self, database: &str, username: &str, _password: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        if !state.databases.contains(database) {
            return Err(CoreError::not_found(format!("database '{database}'")));
        }
        state.users.insert((database.to_owned(), username.to_owned()));
        Ok(())
    }

    async fn drop_user(&self, database: &str, username: &str) -> Result<(), CoreError> {
        self.state.lock().users.remove(&(database.to_owned(), username.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_user_requires_existing_database() {
        let backend = InMemoryDbBackend::new("zone-a");
        let err = backend.create_user("db_demo_1", "db_demo_1_user_rw", "pw").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn drop_database_cascades_to_its_users() {
        let backend = InMemoryDbBackend::new("zone-a");
        backend.create_database("db_demo_1").await.unwrap();
        backend.create_user("db_demo_1", "db_demo_1_user_rw", "pw").await.unwrap();
        backend.drop_database("db_demo_1").await.unwrap();
        assert!(!backend.has_user("db_demo_1", "db_demo_1_user_rw"));
    }
}
