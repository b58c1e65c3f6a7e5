use axum::http::{Method, StatusCode};
use garant::create_prom_metrics;
use serde_json::json;

mod common;
use common::{empty_request, json_request, TestApp, PASSWORD};

// NOTE: Prometheus metrics use a global recorder. Installing it twice is a
// no-op, so every test here shares one registry and asserts only on
// counters growing.

fn prom_app() -> TestApp {
    // ---
    TestApp::with_metrics(create_prom_metrics().expect("prometheus metrics"))
}

async fn render(app: &TestApp) -> (StatusCode, String) {
    // ---
    let (status, bytes) = app.send_raw(empty_request(Method::GET, "/metrics", None)).await;
    (status, String::from_utf8(bytes).expect("metrics are UTF-8"))
}

#[tokio::test]
async fn metrics_endpoint_with_prometheus() {
    // ---
    let app = prom_app();
    let user = app.signed_up_user("metrics-user").await;

    let _ = app
        .send(json_request(
            Method::POST,
            "/login",
            None,
            json!({ "username": "metrics-user", "password": "wrong" }),
        ))
        .await;
    let _ = app
        .send(json_request(Method::POST, &user.path("/sync"), Some(&user.token), json!([])))
        .await;
    let _ = app.send(empty_request(Method::GET, "/health", None)).await;

    let (status, body) = render(&app).await;
    assert_eq!(status, StatusCode::OK);

    assert!(body.contains("registrations_total"));
    assert!(body.contains("logins_total"));
    assert!(body.contains("outcome=\"failure\""));
    assert!(body.contains("item_syncs_total"));
    assert!(body.contains("http_request_duration_seconds"));
    // Labels use the route template, not the concrete id.
    assert!(body.contains("path=\"/users/{id}/sync\""));
    assert!(!body.contains(&user.id));
}

#[tokio::test]
async fn metrics_endpoint_with_noop() {
    // ---
    let app = TestApp::new();

    let _ = app.send(empty_request(Method::GET, "/health", None)).await;
    let _ = app
        .send(json_request(
            Method::POST,
            "/register",
            None,
            json!({ "username": "noop", "password": PASSWORD, "email": "noop@example.com" }),
        ))
        .await;

    let (status, body) = render(&app).await;

    // Should still return success even with noop metrics
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn metrics_content_type_is_correct() {
    // ---
    let app = prom_app();

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        empty_request(Method::GET, "/metrics", None),
    )
    .await
    .unwrap();

    assert!(response.status().is_success());

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|ct| ct.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(
        content_type.starts_with("text/plain"),
        "Content type should be appropriate for metrics: {content_type}"
    );
}
