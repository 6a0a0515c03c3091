use async_trait::async_trait;
use chrono::Utc;
use cp_errors::CoreError;
use rand::Rng;
use rand::distr::Alphanumeric;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ConnectionTrait, Database, DatabaseConnection, TransactionTrait};

use crate::entity::container_claim::{ClaimStatus, RunType};
use crate::entity::database_claim::DbCredential;
use crate::entity::{account, container_claim, container_zone, database_claim, db_zone, membership, project, session, usage_counter};
use crate::migration::Migrator;
use crate::repo::{AuthoritativeStore, NewContainerClaim};
use sea_orm_migration::MigratorTrait;

fn not_found(what: impl Into<String>) -> CoreError {
    CoreError::not_found(what)
}

fn internal(err: DbErr) -> CoreError {
    CoreError::Internal(err.into())
}

/// Concrete sea-orm-backed authoritative store; the sole production implementation of
/// [`AuthoritativeStore`].
pub struct SeaOrmStore {
    conn: DatabaseConnection,
}

impl SeaOrmStore {
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let conn = Database::connect(url).await.map_err(internal)?;
        Ok(Self { conn })
    }

    pub async fn migrate(&self) -> Result<(), CoreError> {
        Migrator::up(&self.conn, None).await.map_err(internal)
    }

    #[must_use]
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    fn random_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }
}

#[async_trait]
impl AuthoritativeStore for SeaOrmStore {
    async fn get_account(&self, account_id: i64) -> Result<account::Model, CoreError> {
        account::Entity::find_by_id(account_id)
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("account"))
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<account::Model>, CoreError> {
        account::Entity::find()
            .filter(account::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .map_err(internal)
    }

    async fn create_account(&self, username: &str, email: &str) -> Result<account::Model, CoreError> {
        let am = account::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            username: Set(username.to_owned()),
            email: Set(email.to_owned()),
            suspended_at: Set(None),
            deleted_at: Set(None),
        };
        let res = account::Entity::insert(am).exec(&self.conn).await.map_err(internal)?;
        self.get_account(res.last_insert_id).await
    }

    async fn active_account_count(&self) -> Result<i64, CoreError> {
        account::Entity::find()
            .filter(account::Column::SuspendedAt.is_null())
            .filter(account::Column::DeletedAt.is_null())
            .count(&self.conn)
            .await
            .map(|c| i64::try_from(c).unwrap_or(i64::MAX))
            .map_err(internal)
    }

    async fn account_by_session(&self, token: &str) -> Result<account::Model, CoreError> {
        let s = session::Entity::find_by_id(token.to_owned())
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("session"))?;
        self.get_account(s.account_id).await
    }

    async fn account_by_api_token(&self, token: &str) -> Result<account::Model, CoreError> {
        let t = crate::entity::api_token::Entity::find_by_id(token.to_owned())
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("api token"))?;
        self.get_account(t.account_id).await
    }

    async fn create_session(&self, account_id: i64) -> Result<String, CoreError> {
        let token = Self::random_token();
        let am = session::ActiveModel {
            token: Set(token.clone()),
            account_id: Set(account_id),
            created_at: Set(Utc::now()),
        };
        session::Entity::insert(am).exec(&self.conn).await.map_err(internal)?;
        Ok(token)
    }

    async fn issue_api_token(&self, account_id: i64) -> Result<String, CoreError> {
        use crate::entity::api_token;
        let token = Self::random_token();
        self.conn
            .transaction::<_, (), DbErr>(|txn| {
                let token = token.clone();
                Box::pin(async move {
                    api_token::Entity::delete_many()
                        .filter(api_token::Column::AccountId.eq(account_id))
                        .exec(txn)
                        .await?;
                    let am = api_token::ActiveModel {
                        token: Set(token),
                        account_id: Set(account_id),
                        created_at: Set(Utc::now()),
                    };
                    api_token::Entity::insert(am).exec(txn).await?;
                    Ok(())
                })
            })
            .await
            .map_err(|e| internal(e.into()))?;
        Ok(token)
    }

    async fn create_project_for_account(
        &self,
        account_id: i64,
        name: &str,
        description: &str,
    ) -> Result<project::Model, CoreError> {
        let name = name.to_owned();
        let description = description.to_owned();
        let created = self
            .conn
            .transaction::<_, project::Model, DbErr>(|txn| {
                Box::pin(async move {
                    let am = project::ActiveModel {
                        id: sea_orm::ActiveValue::NotSet,
                        name: Set(name),
                        description: Set(description),
                        deleted_at: Set(None),
                    };
                    let res = project::Entity::insert(am).exec(txn).await?;
                    let project_id = res.last_insert_id;

                    membership::Entity::insert(membership::ActiveModel {
                        account_id: Set(account_id),
                        project_id: Set(project_id),
                    })
                    .exec(txn)
                    .await?;

                    crate::entity::billing::Entity::insert(crate::entity::billing::ActiveModel {
                        project_id: Set(project_id),
                        current_credits: Set(0),
                        credits_delta: Set(0),
                        details: Set(serde_json::json!({})),
                    })
                    .exec(txn)
                    .await?;

                    project::Entity::find_by_id(project_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| DbErr::RecordNotFound("project".to_owned()))
                })
            })
            .await
            .map_err(|e| internal(e.into()))?;
        Ok(created)
    }

    async fn get_project(&self, project_id: i64) -> Result<project::Model, CoreError> {
        project::Entity::find_by_id(project_id)
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("project"))
    }

    async fn add_member_by_username(&self, project_id: i64, username: &str) -> Result<(), CoreError> {
        let account = self
            .find_account_by_username(username)
            .await?
            .ok_or_else(|| not_found(format!("account '{username}'")))?;
        membership::Entity::insert(membership::ActiveModel {
            account_id: Set(account.id),
            project_id: Set(project_id),
        })
        .on_conflict(
            OnConflict::columns([membership::Column::AccountId, membership::Column::ProjectId])
                .do_nothing()
                .to_owned(),
        )
        .exec(&self.conn)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn is_member(&self, project_id: i64, account_id: i64) -> Result<bool, CoreError> {
        membership::Entity::find_by_id((account_id, project_id))
            .one(&self.conn)
            .await
            .map(|m| m.is_some())
            .map_err(internal)
    }

    async fn upsert_container_zone(&self, zone: container_zone::Model) -> Result<(), CoreError> {
        let am = container_zone::ActiveModel {
            name: Set(zone.name),
            default_routing_ip: Set(zone.default_routing_ip),
            cpu_millicores: Set(zone.cpu_millicores),
            memory_mb: Set(zone.memory_mb),
        };
        container_zone::Entity::insert(am)
            .on_conflict(
                OnConflict::column(container_zone::Column::Name)
                    .update_columns([
                        container_zone::Column::DefaultRoutingIp,
                        container_zone::Column::CpuMillicores,
                        container_zone::Column::MemoryMb,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn upsert_db_zone(&self, zone: db_zone::Model) -> Result<(), CoreError> {
        let am = db_zone::ActiveModel {
            name: Set(zone.name),
            connection_url: Set(zone.connection_url),
        };
        db_zone::Entity::insert(am)
            .on_conflict(
                OnConflict::column(db_zone::Column::Name)
                    .update_columns([db_zone::Column::ConnectionUrl])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn list_container_zones(&self) -> Result<Vec<container_zone::Model>, CoreError> {
        container_zone::Entity::find().all(&self.conn).await.map_err(internal)
    }

    async fn list_db_zones(&self) -> Result<Vec<db_zone::Model>, CoreError> {
        db_zone::Entity::find().all(&self.conn).await.map_err(internal)
    }

    async fn get_container_zone(&self, name: &str) -> Result<container_zone::Model, CoreError> {
        container_zone::Entity::find_by_id(name.to_owned())
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found(format!("container zone '{name}'")))
    }

    async fn get_db_zone(&self, name: &str) -> Result<db_zone::Model, CoreError> {
        db_zone::Entity::find_by_id(name.to_owned())
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found(format!("db zone '{name}'")))
    }

    async fn list_container_claims(&self, project_id: i64) -> Result<Vec<container_claim::Model>, CoreError> {
        container_claim::Entity::find()
            .filter(container_claim::Column::ProjectId.eq(project_id))
            .filter(container_claim::Column::DeletedAt.is_null())
            .order_by_desc(container_claim::Column::CreatedAt)
            .all(&self.conn)
            .await
            .map_err(internal)
    }

    async fn get_container_claim(&self, claim_id: i64) -> Result<container_claim::Model, CoreError> {
        container_claim::Entity::find_by_id(claim_id)
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("container claim"))
    }

    async fn find_container_claim_by_name(
        &self,
        project_id: i64,
        name: &str,
    ) -> Result<Option<container_claim::Model>, CoreError> {
        container_claim::Entity::find()
            .filter(container_claim::Column::ProjectId.eq(project_id))
            .filter(container_claim::Column::Name.eq(name))
            .filter(container_claim::Column::DeletedAt.is_null())
            .filter(container_claim::Column::Status.ne(ClaimStatus::Inactive))
            .one(&self.conn)
            .await
            .map_err(internal)
    }

    async fn find_colliding_claim_names(&self, project_id: i64, name: &str) -> Result<Vec<String>, CoreError> {
        let prefix = format!("{name}-");
        let rows = container_claim::Entity::find()
            .filter(container_claim::Column::ProjectId.eq(project_id))
            .filter(container_claim::Column::DeletedAt.is_null())
            .filter(container_claim::Column::Status.ne(ClaimStatus::Inactive))
            .filter(
                container_claim::Column::Name
                    .eq(name)
                    .or(container_claim::Column::Name.starts_with(&prefix)),
            )
            .order_by_desc(container_claim::Column::CreatedAt)
            .all(&self.conn)
            .await
            .map_err(internal)?;
        Ok(rows
            .into_iter()
            .map(|r| r.name)
            .filter(|n| n == name || n.strip_prefix(&prefix).is_some_and(|suf| suf.chars().all(|c| c.is_ascii_digit()) && !suf.is_empty()))
            .collect())
    }

    async fn insert_container_claim(&self, new_claim: NewContainerClaim) -> Result<container_claim::Model, CoreError> {
        let am = container_claim::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            project_id: Set(new_claim.project_id),
            creator_account_id: Set(new_claim.creator_account_id),
            name: Set(new_claim.name),
            image_ref: Set(new_claim.image_ref),
            image_tag: Set(new_claim.image_tag),
            command: Set(new_claim.command),
            run_type: Set(new_claim.run_type),
            target_ports: Set(new_claim.target_ports),
            public_ports: Set(Vec::new()),
            zones: Set(new_claim.zones),
            env_var_names: Set(new_claim.env_var_names),
            cpu_millicores: Set(new_claim.cpu_millicores),
            memory_mb: Set(new_claim.memory_mb),
            node_ip: Set(None),
            status: Set(ClaimStatus::Activating),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
        };
        let res = container_claim::Entity::insert(am).exec(&self.conn).await.map_err(internal)?;
        self.get_container_claim(res.last_insert_id).await
    }

    async fn set_container_status(&self, claim_id: i64, status: ClaimStatus) -> Result<(), CoreError> {
        let am = container_claim::ActiveModel {
            id: Set(claim_id),
            status: Set(status),
            ..Default::default()
        };
        container_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn set_container_node_ip(&self, claim_id: i64, node_ip: &str) -> Result<(), CoreError> {
        let am = container_claim::ActiveModel {
            id: Set(claim_id),
            node_ip: Set(Some(node_ip.to_owned())),
            ..Default::default()
        };
        container_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn set_container_public_ports(&self, claim_id: i64, ports: Vec<i32>) -> Result<(), CoreError> {
        let am = container_claim::ActiveModel {
            id: Set(claim_id),
            public_ports: Set(ports),
            ..Default::default()
        };
        container_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn soft_delete_container_claim(&self, claim_id: i64) -> Result<(), CoreError> {
        let am = container_claim::ActiveModel {
            id: Set(claim_id),
            status: Set(ClaimStatus::Inactive),
            deleted_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        container_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn try_reserve_port(&self, claim_id: i64, candidate: i32) -> Result<bool, CoreError> {
        self.conn
            .transaction::<_, bool, DbErr>(|txn| {
                Box::pin(async move {
                    let taken = container_claim::Entity::find()
                        .filter(container_claim::Column::DeletedAt.is_null())
                        .filter(container_claim::Column::Id.ne(claim_id))
                        .all(txn)
                        .await?
                        .iter()
                        .any(|c| c.public_ports.contains(&candidate));
                    if taken {
                        return Ok(false);
                    }
                    let claim = container_claim::Entity::find_by_id(claim_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| DbErr::RecordNotFound("container claim".to_owned()))?;
                    let mut ports = claim.public_ports.clone();
                    if ports.contains(&candidate) {
                        return Ok(false);
                    }
                    ports.push(candidate);
                    container_claim::Entity::update(container_claim::ActiveModel {
                        id: Set(claim_id),
                        public_ports: Set(ports),
                        ..Default::default()
                    })
                    .exec(txn)
                    .await?;
                    Ok(true)
                })
            })
            .await
            .map_err(|e| internal(e.into()))
    }

    async fn get_database_claim_for_project(
        &self,
        project_id: i64,
    ) -> Result<Option<database_claim::Model>, CoreError> {
        database_claim::Entity::find()
            .filter(database_claim::Column::ProjectId.eq(project_id))
            .filter(database_claim::Column::DeletedAt.is_null())
            .one(&self.conn)
            .await
            .map_err(internal)
    }

    async fn get_database_claim(&self, claim_id: i64) -> Result<database_claim::Model, CoreError> {
        database_claim::Entity::find_by_id(claim_id)
            .one(&self.conn)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("database claim"))
    }

    async fn insert_database_claim(
        &self,
        project_id: i64,
        zones: Vec<String>,
        database_name: String,
    ) -> Result<database_claim::Model, CoreError> {
        if self.get_database_claim_for_project(project_id).await?.is_some() {
            return Err(CoreError::conflict("project already has a database claim"));
        }
        let am = database_claim::ActiveModel {
            id: sea_orm::ActiveValue::NotSet,
            project_id: Set(project_id),
            zones: Set(zones),
            database_name: Set(database_name),
            credentials: Set(Vec::new()),
            status: Set(ClaimStatus::Activating),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
        };
        let res = database_claim::Entity::insert(am).exec(&self.conn).await.map_err(internal)?;
        self.get_database_claim(res.last_insert_id).await
    }

    async fn set_database_status(&self, claim_id: i64, status: ClaimStatus) -> Result<(), CoreError> {
        let am = database_claim::ActiveModel {
            id: Set(claim_id),
            status: Set(status),
            ..Default::default()
        };
        database_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn append_database_credential(&self, claim_id: i64, cred: DbCredential) -> Result<(), CoreError> {
        let claim = self.get_database_claim(claim_id).await?;
        let mut creds = claim.credentials;
        creds.push(cred);
        let am = database_claim::ActiveModel {
            id: Set(claim_id),
            credentials: Set(creds),
            ..Default::default()
        };
        database_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn soft_delete_database_claim(&self, claim_id: i64) -> Result<(), CoreError> {
        let am = database_claim::ActiveModel {
            id: Set(claim_id),
            status: Set(ClaimStatus::Inactive),
            deleted_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        database_claim::Entity::update(am).exec(&self.conn).await.map_err(internal)?;
        Ok(())
    }

    async fn get_usage(&self, account_id: i64, zone: &str) -> Result<usage_counter::Model, CoreError> {
        let found = usage_counter::Entity::find_by_id((account_id, zone.to_owned()))
            .one(&self.conn)
            .await
            .map_err(internal)?;
        Ok(found.unwrap_or(usage_counter::Model {
            account_id,
            zone_name: zone.to_owned(),
            used_cpu_millicores: 0,
            used_memory_mb: 0,
        }))
    }

    async fn add_usage(&self, account_id: i64, zone: &str, cpu: i32, mem: i32) -> Result<(), CoreError> {
        let current = self.get_usage(account_id, zone).await?;
        let am = usage_counter::ActiveModel {
            account_id: Set(account_id),
            zone_name: Set(zone.to_owned()),
            used_cpu_millicores: Set(current.used_cpu_millicores + cpu),
            used_memory_mb: Set(current.used_memory_mb + mem),
        };
        usage_counter::Entity::insert(am)
            .on_conflict(
                OnConflict::columns([usage_counter::Column::AccountId, usage_counter::Column::ZoneName])
                    .update_columns([usage_counter::Column::UsedCpuMillicores, usage_counter::Column::UsedMemoryMb])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn subtract_usage_clamped(&self, account_id: i64, zone: &str, cpu: i32, mem: i32) -> Result<(), CoreError> {
        let current = self.get_usage(account_id, zone).await?;
        // Clamp to zero rather than let the update fail against the `>= 0` check constraint:
        // concurrent deactivations racing against a fresh create can otherwise underflow.
        let new_cpu = (current.used_cpu_millicores - cpu).max(0);
        let new_mem = (current.used_memory_mb - mem).max(0);
        let am = usage_counter::ActiveModel {
            account_id: Set(account_id),
            zone_name: Set(zone.to_owned()),
            used_cpu_millicores: Set(new_cpu),
            used_memory_mb: Set(new_mem),
        };
        usage_counter::Entity::insert(am)
            .on_conflict(
                OnConflict::columns([usage_counter::Column::AccountId, usage_counter::Column::ZoneName])
                    .update_columns([usage_counter::Column::UsedCpuMillicores, usage_counter::Column::UsedMemoryMb])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await
            .map_err(internal)?;
        Ok(())
    }
}
