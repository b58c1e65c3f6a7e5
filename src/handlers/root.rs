use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the Garant API
Version: {version}

Available endpoints:
  - POST   /register                         - Create a login (username, password, email)
  - POST   /login                            - Exchange credentials for a token pair
  - POST   /token                            - Exchange a refresh token for a new pair
  - POST   /users                            - Create your profile
  - GET    /users/{{id}}                       - Fetch your profile
  - PUT    /users/{{id}}                       - Update profile fields
  - GET    /users/{{id}}/items                 - List items
  - POST   /users/{{id}}/items                 - Add an item (multipart)
  - PUT    /users/{{id}}/items/{{itemId}}        - Edit an item (multipart)
  - DELETE /users/{{id}}/items/{{itemId}}        - Delete an item
  - POST   /users/{{id}}/sync                  - Replace the item list
  - GET    /users/{{id}}/items/expiring        - Items expiring within 7 days
  - GET    /uploads/{{file}}                   - Stored product and receipt images
  - GET    /health                           - Light health check
  - GET    /health?mode=full                 - Full health check (includes the store)
  - GET    /metrics                          - Prometheus metrics

All /users routes require `Authorization: Bearer <token>` for the profile owner.
"#
    )
}
