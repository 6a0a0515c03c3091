//! Deterministic derived names for backend artifacts. Pure functions; no I/O.

#[must_use]
pub fn namespace_name(project_name: &str, project_id: i64) -> String {
    format!("namespace-{project_name}-{project_id}")
}

#[must_use]
pub fn deployment_name(claim_name: &str, claim_id: i64) -> String {
    format!("deployment-{claim_name}-{claim_id}")
}

#[must_use]
pub fn job_name(claim_name: &str, claim_id: i64) -> String {
    format!("job-{claim_name}-{claim_id}")
}

#[must_use]
pub fn service_name(claim_name: &str, claim_id: i64, target_port: i32) -> String {
    format!("service-{claim_name}-{claim_id}-{target_port}")
}

#[must_use]
pub fn secret_name(claim_name: &str, env_var: &str) -> String {
    format!("secret-{claim_name}-{}", env_var.replace('_', "-").to_lowercase())
}

#[must_use]
pub fn database_name(project_name: &str, project_id: i64) -> String {
    format!("db_{}_{project_id}", project_name.replace('-', "_").to_lowercase())
}

#[must_use]
pub fn rw_user_name(database: &str) -> String {
    format!("{database}_user_rw")
}

#[must_use]
pub fn ro_user_name(database: &str) -> String {
    format!("{database}_user_ro")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_match_their_expected_shapes() {
        assert_eq!(namespace_name("demo", 7), "namespace-demo-7");
        assert_eq!(deployment_name("svc", 42), "deployment-svc-42");
        assert_eq!(service_name("svc", 42, 8080), "service-svc-42-8080");
        assert_eq!(secret_name("svc", "API_KEY"), "secret-svc-api-key");
        assert_eq!(database_name("my-project", 3), "db_my_project_3");
        assert_eq!(rw_user_name("db_demo_1"), "db_demo_1_user_rw");
        assert_eq!(ro_user_name("db_demo_1"), "db_demo_1_user_ro");
    }
}
