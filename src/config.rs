// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Which backend holds credentials and profile documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: server::ServerConfig,
    pub store: StoreKind,
    /// Present only when `store` is `Postgres`.
    pub database: Option<database::DatabaseConfig>,
    pub auth: auth::AuthConfig,
    pub uploads: uploads::UploadConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    pub fn from_env() -> Result<Self> {
        // ---
        let store = match std::env::var("GARANT_STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            Ok("postgres") | Err(_) => StoreKind::Postgres,
            Ok(other) => anyhow::bail!("Unknown GARANT_STORE value: {other}"),
        };

        let database = match store {
            StoreKind::Postgres => Some(database::DatabaseConfig::from_env()?),
            StoreKind::Memory => None,
        };

        Ok(Self {
            server: server::ServerConfig::from_env()?,
            store,
            database,
            auth: auth::AuthConfig::from_env()?,
            uploads: uploads::UploadConfig::from_env()?,
        })
    }
}

// ============================================================
// Server configuration
// ============================================================

mod server {
    // ---
    use super::*;

    /// Listener and browser-facing settings.
    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Address the HTTP listener binds to. Defaults to `127.0.0.1:8080`.
        pub bind_addr: String,

        /// Origins allowed by CORS. Empty means any origin.
        pub allowed_origins: Vec<String>,
    }

    impl ServerConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let bind_addr =
                std::env::var("GARANT_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

            let allowed_origins = std::env::var("GARANT_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            Ok(Self {
                bind_addr,
                allowed_origins,
            })
        }
    }
}
pub use server::ServerConfig;

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 10.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 1.
        pub min_connections: u32,

        /// Maximum number of connections open concurrently. Defaults to 10.
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if `DATABASE_URL` is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("GARANT_DB_RETRY_COUNT", u32, 10);
            let acquire_timeout_secs = optional_env_parse!("GARANT_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("GARANT_DB_MIN_CONNECTIONS", u32, 1);
            let max_connections = optional_env_parse!("GARANT_DB_MAX_CONNECTIONS", u32, 10);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Auth configuration
// ============================================================

mod auth {
    // ---
    use super::*;

    /// Token signing and password hashing settings.
    #[derive(Debug, Clone)]
    pub struct AuthConfig {
        /// HMAC secret shared by access and refresh tokens.
        pub jwt_secret: String,

        /// Lifetime of an access token issued at login. Defaults to 15 minutes.
        pub access_ttl: Duration,

        /// Lifetime of an access token issued by `/token`. Defaults to 40 minutes.
        pub refreshed_access_ttl: Duration,

        /// Lifetime of a refresh token. Defaults to 7 days.
        pub refresh_ttl: Duration,

        /// bcrypt work factor. Defaults to 10.
        pub bcrypt_cost: u32,
    }

    impl AuthConfig {
        /// Builds an [`AuthConfig`] from environment variables.
        ///
        /// # Errors
        /// The signing secret is security-critical and must be explicitly provided.
        pub fn from_env() -> Result<Self> {
            // ---
            let jwt_secret = required_env!("GARANT_JWT_SECRET");
            if jwt_secret.trim().is_empty() {
                anyhow::bail!("GARANT_JWT_SECRET must not be empty");
            }

            let access_ttl = optional_env_parse!("GARANT_ACCESS_TTL_SEC", u64, 900);
            let refreshed_access_ttl =
                optional_env_parse!("GARANT_REFRESHED_ACCESS_TTL_SEC", u64, 2_400);
            let refresh_ttl = optional_env_parse!("GARANT_REFRESH_TTL_SEC", u64, 604_800);
            let bcrypt_cost = optional_env_parse!("GARANT_BCRYPT_COST", u32, 10);

            Ok(Self {
                jwt_secret,
                access_ttl: Duration::from_secs(access_ttl),
                refreshed_access_ttl: Duration::from_secs(refreshed_access_ttl),
                refresh_ttl: Duration::from_secs(refresh_ttl),
                bcrypt_cost,
            })
        }
    }
}
pub use auth::AuthConfig;

// ============================================================
// Upload configuration
// ============================================================

mod uploads {
    // ---
    use super::*;

    /// Where item attachments land and how large a request may be.
    #[derive(Debug, Clone)]
    pub struct UploadConfig {
        /// Directory for product and receipt images. Defaults to `uploads`.
        pub dir: PathBuf,

        /// Maximum multipart body size in bytes. Defaults to 10 MiB.
        pub max_bytes: usize,
    }

    impl UploadConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let dir = std::env::var("GARANT_UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
            let max_bytes = optional_env_parse!("GARANT_UPLOAD_MAX_BYTES", usize, 10 * 1024 * 1024);

            Ok(Self {
                dir: PathBuf::from(dir),
                max_bytes,
            })
        }
    }
}
pub use uploads::UploadConfig;

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use anyhow::Result;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_database_url_fails() -> Result<()> {
        // ---
        std::env::remove_var("DATABASE_URL");

        assert_missing_config!(database::DatabaseConfig::from_env(), "DATABASE_URL");

        Ok(())
    }

    #[test]
    #[serial]
    fn database_defaults_applied() -> Result<()> {
        // ---
        let db_url = "postgres://test";
        std::env::set_var("DATABASE_URL", db_url);

        std::env::remove_var("GARANT_DB_RETRY_COUNT");
        std::env::remove_var("GARANT_DB_ACQUIRE_TIMEOUT_SEC");
        std::env::remove_var("GARANT_DB_MIN_CONNECTIONS");
        std::env::remove_var("GARANT_DB_MAX_CONNECTIONS");

        let cfg = database::DatabaseConfig::from_env()?;
        assert_eq!(cfg.database_url, db_url);
        assert_eq!(cfg.retry_count, 10);
        assert_eq!(cfg.acquire_timeout.as_secs(), 30);
        assert_eq!(cfg.min_connections, 1);
        assert_eq!(cfg.max_connections, 10);

        Ok(())
    }

    #[test]
    #[serial]
    fn missing_jwt_secret_fails() -> Result<()> {
        // ---
        std::env::remove_var("GARANT_JWT_SECRET");

        assert_missing_config!(auth::AuthConfig::from_env(), "GARANT_JWT_SECRET");

        Ok(())
    }

    #[test]
    #[serial]
    fn auth_overrides_defaults() -> Result<()> {
        // ---
        std::env::set_var("GARANT_JWT_SECRET", "skrivnost");
        std::env::set_var("GARANT_ACCESS_TTL_SEC", "60");
        std::env::set_var("GARANT_REFRESH_TTL_SEC", "not-a-number");
        std::env::remove_var("GARANT_REFRESHED_ACCESS_TTL_SEC");
        std::env::remove_var("GARANT_BCRYPT_COST");

        let cfg = auth::AuthConfig::from_env()?;
        assert_eq!(cfg.jwt_secret, "skrivnost");
        assert_eq!(cfg.access_ttl.as_secs(), 60);
        assert_eq!(cfg.refreshed_access_ttl.as_secs(), 2_400);
        assert_eq!(cfg.refresh_ttl.as_secs(), 604_800);
        assert_eq!(cfg.bcrypt_cost, 10);

        std::env::remove_var("GARANT_ACCESS_TTL_SEC");
        std::env::remove_var("GARANT_REFRESH_TTL_SEC");

        Ok(())
    }

    #[test]
    #[serial]
    fn memory_store_skips_database_config() -> Result<()> {
        // ---
        std::env::set_var("GARANT_STORE", "memory");
        std::env::remove_var("DATABASE_URL");
        std::env::set_var("GARANT_JWT_SECRET", "skrivnost");
        std::env::set_var("GARANT_ALLOWED_ORIGINS", "http://localhost:3000, ,http://127.0.0.1:3000");

        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.store, StoreKind::Memory);
        assert!(cfg.database.is_none());
        assert_eq!(
            cfg.server.allowed_origins,
            vec!["http://localhost:3000", "http://127.0.0.1:3000"]
        );

        std::env::remove_var("GARANT_STORE");
        std::env::remove_var("GARANT_ALLOWED_ORIGINS");

        Ok(())
    }

    #[test]
    #[serial]
    fn unknown_store_kind_is_rejected() {
        // ---
        std::env::set_var("GARANT_STORE", "mongo");

        let err = AppConfig::from_env().expect_err("expected configuration error");
        assert!(err.to_string().contains("mongo"));

        std::env::remove_var("GARANT_STORE");
    }
}
