//! Runs against a live Postgres when `DATABASE_URL` is set; otherwise each
//! test returns early.

use chrono::{Duration as ChronoDuration, Utc};
use garant::domain::{Credential, Item, Profile, RepositoryPtr, StoreError};
use garant::{connect_with_retry, create_postgres_repository, run_migrations, DatabaseConfig};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

fn test_database_config() -> Option<DatabaseConfig> {
    // ---
    let database_url = std::env::var("DATABASE_URL").ok()?;

    Some(DatabaseConfig {
        database_url,
        retry_count: 3,
        acquire_timeout: Duration::from_secs(5),
        min_connections: 1,
        max_connections: 4,
    })
}

// Helper to connect, create the schema and start from empty tables
async fn setup_test_db() -> Option<(PgPool, RepositoryPtr)> {
    // ---
    let Some(config) = test_database_config() else {
        eprintln!("DATABASE_URL not set; skipping Postgres repository test");
        return None;
    };

    let pool = connect_with_retry(&config)
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    sqlx::query("TRUNCATE TABLE credentials, profiles")
        .execute(&pool)
        .await
        .expect("Failed to clean up test database");

    let repo = create_postgres_repository(pool.clone());
    Some((pool, repo))
}

fn credential(username: &str, email: &str) -> Credential {
    // ---
    Credential::new(username.to_string(), email.to_string(), "$2b$04$hash".to_string())
}

fn item(name: &str, days: i64) -> Item {
    // ---
    Item {
        id: Uuid::new_v4(),
        name: name.to_string(),
        manufacturer: "Bosch".to_string(),
        warranty_expiry_date: Utc::now() + ChronoDuration::days(days),
        product_image: None,
        receipt_image: Some("uploads/1-abcd1234-receipt.jpg".to_string()),
        notes: Some("kitchen".to_string()),
    }
}

#[tokio::test]
#[serial_test::serial]
async fn test_create_and_get_credential() {
    // ---
    let Some((_pool, repo)) = setup_test_db().await else {
        return;
    };

    let stored = credential("ana", "ana@example.com");
    repo.create_credential(stored.clone())
        .await
        .expect("Failed to create credential");

    let found = repo
        .get_credential_by_username("ana")
        .await
        .expect("Query should succeed")
        .expect("Credential not found");

    assert_eq!(found.id, stored.id);
    assert_eq!(found.email, "ana@example.com");
    assert_eq!(found.password_hash, stored.password_hash);

    let missing = repo
        .get_credential_by_username("nobody")
        .await
        .expect("Query should succeed");
    assert!(missing.is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn test_unique_constraints_map_to_conflict() {
    // ---
    let Some((_pool, repo)) = setup_test_db().await else {
        return;
    };

    repo.create_credential(credential("bor", "bor@example.com"))
        .await
        .unwrap();

    let same_username = repo
        .create_credential(credential("bor", "other@example.com"))
        .await;
    assert!(matches!(same_username, Err(StoreError::Conflict("username"))));

    let same_email = repo
        .create_credential(credential("cene", "bor@example.com"))
        .await;
    assert!(matches!(same_email, Err(StoreError::Conflict("email"))));
}

#[tokio::test]
#[serial_test::serial]
async fn test_profile_items_round_trip_through_jsonb() {
    // ---
    let Some((_pool, repo)) = setup_test_db().await else {
        return;
    };

    let mut profile = Profile::new(
        Uuid::new_v4(),
        "Ana".to_string(),
        "Novak".to_string(),
        "ana@example.com".to_string(),
    );
    repo.create_profile(&profile).await.unwrap();
    assert!(matches!(
        repo.create_profile(&profile).await,
        Err(StoreError::Conflict("profile"))
    ));

    profile.add_item(item("Dishwasher", 400));
    profile.add_item(item("Kettle", 3));
    assert!(repo.save_profile(&profile).await.unwrap());

    let loaded = repo
        .get_profile(profile.id)
        .await
        .unwrap()
        .expect("Profile not found");

    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].name, "Dishwasher");
    assert_eq!(loaded.items[1].receipt_image, profile.items[1].receipt_image);
    // JSON timestamps keep sub-second precision down to what chrono serializes.
    assert_eq!(
        loaded.items[1].warranty_expiry_date.timestamp_millis(),
        profile.items[1].warranty_expiry_date.timestamp_millis()
    );
}

#[tokio::test]
#[serial_test::serial]
async fn test_save_unknown_profile_and_ping() {
    // ---
    let Some((_pool, repo)) = setup_test_db().await else {
        return;
    };

    let stranger = Profile::new(
        Uuid::new_v4(),
        "Nobody".to_string(),
        "Here".to_string(),
        "nobody@example.com".to_string(),
    );

    assert!(!repo.save_profile(&stranger).await.unwrap());
    assert!(repo.get_profile(stranger.id).await.unwrap().is_none());
    repo.ping().await.expect("Ping should succeed");
}
