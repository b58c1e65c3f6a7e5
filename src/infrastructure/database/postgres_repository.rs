use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Credential, Item, Profile, Repository, RepositoryPtr, StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    items: Json<Vec<Item>>,
}

impl From<CredentialRow> for Credential {
    fn from(r: CredentialRow) -> Self {
        // ---
        Credential {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

impl From<ProfileRow> for Profile {
    fn from(r: ProfileRow) -> Self {
        // ---
        Profile {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            items: r.items.0,
        }
    }
}

pub fn create_postgres_repository(pool: PgPool) -> RepositoryPtr {
    // ---
    Arc::new(PostgresRepository::new(pool))
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

/// Turns unique-constraint violations into `Conflict`, naming the offending field.
fn map_insert_error(err: sqlx::Error, fallback: &'static str) -> StoreError {
    // ---
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let what = match db.constraint() {
                Some(name) if name.contains("email") => "email",
                Some(name) if name.contains("username") => "username",
                _ => fallback,
            };
            return StoreError::Conflict(what);
        }
    }
    backend(err)
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn create_credential(&self, credential: Credential) -> StoreResult<()> {
        // ---
        sqlx::query(
            "INSERT INTO credentials (id, username, email, password_hash, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(credential.id)
        .bind(&credential.username)
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "username"))?;

        Ok(())
    }

    async fn get_credential_by_username(&self, username: &str) -> StoreResult<Option<Credential>> {
        // ---
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, username, email, password_hash, created_at
             FROM credentials WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Credential::from))
    }

    async fn create_profile(&self, profile: &Profile) -> StoreResult<()> {
        // ---
        sqlx::query(
            "INSERT INTO profiles (id, first_name, last_name, email, items)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(profile.id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(Json(&profile.items))
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "profile"))?;

        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        // ---
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, first_name, last_name, email, items FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Profile::from))
    }

    async fn save_profile(&self, profile: &Profile) -> StoreResult<bool> {
        // ---
        let result = sqlx::query(
            "UPDATE profiles
             SET first_name = $2, last_name = $3, email = $4, items = $5, updated_at = now()
             WHERE id = $1",
        )
        .bind(profile.id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(Json(&profile.items))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        // ---
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }
}
