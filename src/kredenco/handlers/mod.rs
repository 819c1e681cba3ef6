pub mod health;
pub use self::health::health;

pub mod user_register;
pub use self::user_register::register;

pub mod user_login;
pub use self::user_login::login;

// common functions for the handlers
use crate::kredenco::credentials::Error;
use axum::{http::StatusCode, Json};
use regex::Regex;
use serde_json::{json, Value};
use tracing::error;

pub fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_.-]{3,64}$").map_or(false, |re| re.is_match(username))
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

pub fn valid_password(password: &str) -> bool {
    password.len() >= 8
}

/// Map a Credential Manager error to a response. Collaborator faults
/// are logged with their cause, the body never carries it.
pub(crate) fn error_response(err: &Error) -> (StatusCode, Json<Value>) {
    let status = match err {
        Error::Validation(_) | Error::AlreadyExists => StatusCode::BAD_REQUEST,
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::LoginFailed => StatusCode::FORBIDDEN,
        Error::Store(_) | Error::Protector(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("{}", err);

        // The cause stays in the log, not in the response
        return (status, Json(json!({"message": "Error processing request"})));
    }

    (status, Json(json!({"message": err.to_string()})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kredenco::{
        credentials::test_support::{MemoryStore, RecordingProtector},
        credentials::CredentialManager,
        router,
    };
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request},
        Router,
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with(store: Arc<MemoryStore>, protector: Arc<RecordingProtector>) -> Router {
        router(Arc::new(CredentialManager::new(store, protector)))
    }

    fn app() -> Router {
        app_with(
            Arc::new(MemoryStore::default()),
            Arc::new(RecordingProtector::default()),
        )
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    #[test]
    fn test_valid_username() {
        assert!(valid_username("alice"));
        assert!(valid_username("bob"));
        assert!(valid_username("user.name_01-x"));
        assert!(!valid_username("ab"));
        assert!(!valid_username(""));
        assert!(!valid_username("has space"));
        assert!(!valid_username(&"x".repeat(65)));
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("alice@example.com"));
        assert!(!valid_email("alice@example"));
        assert!(!valid_email("alice example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn test_valid_password() {
        assert!(valid_password("Tr0ub4dor&3"));
        assert!(!valid_password("short"));
        assert!(!valid_password(""));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_register_login_flow() {
        let app = app();

        // register alice
        let (status, _) = post(
            &app,
            "/user/register",
            json!({
                "username": "alice",
                "password": "Tr0ub4dor&3",
                "email": "alice@example.com"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // login with the right password
        let (status, body) = post(
            &app,
            "/user/login",
            json!({"username": "alice", "password": "Tr0ub4dor&3"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert!(body["user"].get("credential").is_none());
        assert!(body["user"].get("salt").is_none());

        // wrong password, uniform message
        let (status, body) = post(
            &app,
            "/user/login",
            json!({"username": "alice", "password": "wrong-password"}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "invalid username or password");

        // unknown user
        let (status, _) = post(
            &app,
            "/user/login",
            json!({"username": "bob", "password": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // duplicate registration
        let (status, body) = post(
            &app,
            "/user/register",
            json!({
                "username": "alice",
                "password": "another-pass",
                "email": "alice@elsewhere.com"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "user already exists");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = app();

        let (status, body) = post(
            &app,
            "/user/register",
            json!({"username": "alice", "password": "short", "email": "alice@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid password");

        let (status, body) = post(
            &app,
            "/user/register",
            json!({"username": "alice", "password": "Tr0ub4dor&3", "email": "nope"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid email");

        let (status, body) = post(
            &app,
            "/user/register",
            json!({"username": "a!", "password": "Tr0ub4dor&3", "email": "a@b.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid username");
    }

    #[tokio::test]
    async fn test_store_fault_returns_500_generic_body() {
        let store = Arc::new(MemoryStore::default());
        store
            .fail_lookup
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let app = app_with(store, Arc::new(RecordingProtector::default()));

        let (status, body) = post(
            &app,
            "/user/register",
            json!({
                "username": "alice",
                "password": "Tr0ub4dor&3",
                "email": "alice@example.com"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // The cause stays in the log, the body carries a generic message
        assert_eq!(body["message"], "Error processing request");
        assert!(!body.to_string().contains("store unavailable"));
    }

    #[tokio::test]
    async fn test_protector_fault_returns_500_generic_body() {
        let protector = Arc::new(RecordingProtector::default());
        protector
            .fail_protect
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let app = app_with(Arc::new(MemoryStore::default()), protector);

        let (status, body) = post(
            &app,
            "/user/register",
            json!({
                "username": "alice",
                "password": "Tr0ub4dor&3",
                "email": "alice@example.com"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error processing request");
        assert!(!body.to_string().contains("protector unavailable"));
    }

    #[tokio::test]
    async fn test_missing_payload() {
        let app = app();

        let request = Request::builder()
            .method("POST")
            .uri("/user/register")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
