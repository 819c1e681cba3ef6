use crate::kredenco::{
    credentials::CredentialManager,
    handlers::{error_response, valid_email, valid_password, valid_username},
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserRegister {
    username: String,
    password: String,
    email: String,
}

// Keep the password out of any log line
impl fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRegister")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("email", &self.email)
            .finish()
    }
}

#[utoipa::path(
    post,
    path = "/user/register",
    request_body = UserRegister,
    responses(
        (status = 200, description = "Registration successful", content_type = "application/json"),
        (status = 400, description = "Missing or invalid field, or user already exists"),
        (status = 500, description = "Store or protector fault"),
    ),
    tag = "register"
)]
// axum handler for register
#[instrument(skip(manager, payload))]
pub async fn register(
    manager: Extension<Arc<CredentialManager>>,
    payload: Option<Json<UserRegister>>,
) -> impl IntoResponse {
    let user: UserRegister = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Missing payload"})),
            )
        }
    };

    debug!("register request: {:?}", user);

    if !valid_username(&user.username) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid username"})),
        );
    }

    if !valid_email(&user.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid email"})),
        );
    }

    if !valid_password(&user.password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid password"})),
        );
    }

    match manager
        .register(&user.username, &user.password, &user.email)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({"message": "User created"}))),
        Err(e) => error_response(&e),
    }
}
