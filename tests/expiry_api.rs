use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

mod common;
use common::{empty_request, json_request, TestApp};

#[tokio::test]
async fn only_items_within_a_week_are_reported() {
    // ---
    let app = TestApp::new();
    let user = app.signed_up_user("expiry").await;

    // A little past the whole day so the count is not on a boundary.
    let soon = Utc::now() + Duration::days(3) - Duration::hours(1);
    let later = Utc::now() + Duration::days(10);
    let past = Utc::now() - Duration::days(1);

    let (status, _) = app
        .send(json_request(
            Method::POST,
            &user.path("/sync"),
            Some(&user.token),
            json!([
                { "name": "Kettle", "manufacturer": "Gorenje", "warrantyExpiryDate": soon.to_rfc3339() },
                { "name": "Laptop", "manufacturer": "Lenovo", "warrantyExpiryDate": later.to_rfc3339() },
                { "name": "Phone", "manufacturer": "Fairphone", "warrantyExpiryDate": past.to_rfc3339() },
            ]),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, expiring) = app
        .send(empty_request(Method::GET, &user.path("/items/expiring"), Some(&user.token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let expiring = expiring.as_array().expect("array");
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0]["name"], "Kettle");
    assert_eq!(expiring[0]["daysUntilExpiry"], 3);
    assert!(expiring[0]["id"].is_string());
}

#[tokio::test]
async fn expiring_is_owner_only() {
    // ---
    let app = TestApp::new();
    let owner = app.signed_up_user("owner").await;
    let intruder = app.signed_up_user("intruder").await;

    let (status, _) = app
        .send(empty_request(Method::GET, &owner.path("/items/expiring"), Some(&intruder.token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(empty_request(Method::GET, &owner.path("/items/expiring"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
