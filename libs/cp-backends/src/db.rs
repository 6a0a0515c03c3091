use async_trait::async_trait;
use cp_errors::CoreError;

/// Async client for one db-zone backend (a Postgres-like relational server).
///
/// One instance per zone; `cp-database-reconciler` talks to the admin database through
/// this trait and never touches per-project databases directly outside of it.
#[async_trait]
pub trait DbBackend: Send + Sync {
    fn zone_name(&self) -> &str;

    /// Lets tests downcast to a specific backend (e.g. `InMemoryDbBackend`) to inspect
    /// white-box state such as which databases exist.
    fn as_any(&self) -> &dyn std::any::Any;

    async fn create_database(&self, name: &str) -> Result<(), CoreError>;
    async fn drop_database(&self, name: &str) -> Result<(), CoreError>;

    /// Creates `username`/`password` inside `database`, grants it `CREATE, USAGE` on the
    /// `PUBLIC` schema and default privileges on future tables.
    async fn create_user(&self, database: &str, username: &str, password: &str) -> Result<(), CoreError>;
    async fn drop_user(&self, database: &str, username: &str) -> Result<(), CoreError>;
}

const PASSWORD_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$_-!&";

/// Ten-character random password drawn from the same charset the original reconciler used.
#[must_use]
pub fn random_db_password() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..10)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_password_is_ten_chars_from_charset() {
        let pw = random_db_password();
        assert_eq!(pw.len(), 10);
        assert!(pw.chars().all(|c| PASSWORD_CHARSET.contains(&(c as u8))));
    }
}
