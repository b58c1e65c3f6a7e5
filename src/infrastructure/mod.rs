mod attachments;
mod database;
pub mod metrics;

// Re-export the factory functions for easy access
pub use attachments::AttachmentStore;
pub use database::{
    connect_with_retry, create_memory_repository, create_postgres_repository, run_migrations,
};
pub use metrics::{create_noop_metrics, create_prom_metrics};
