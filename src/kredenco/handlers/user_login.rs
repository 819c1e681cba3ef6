use crate::kredenco::{
    credentials::CredentialManager,
    handlers::{error_response, valid_username},
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct UserLogin {
    username: String,
    password: String,
}

// Keep the password out of any log line
impl fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLogin")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = UserLogin,
    responses(
        (status = 200, description = "Login successful", content_type = "application/json"),
        (status = 400, description = "Missing or invalid field"),
        (status = 403, description = "Invalid username or password"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Store or protector fault"),
    ),
    tag = "login"
)]
// axum handler for login
#[instrument(skip(manager, payload))]
pub async fn login(
    manager: Extension<Arc<CredentialManager>>,
    payload: Option<Json<UserLogin>>,
) -> impl IntoResponse {
    let user: UserLogin = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"message": "Missing payload"})),
            )
        }
    };

    debug!("login request: {:?}", user);

    if !valid_username(&user.username) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid username"})),
        );
    }

    // Password format is only policed at registration; here it just
    // needs to be present
    if user.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid password"})),
        );
    }

    match manager.login(&user.username, &user.password).await {
        Ok(public) => (
            StatusCode::OK,
            Json(json!({"message": "Login successful", "user": public})),
        ),
        Err(e) => error_response(&e),
    }
}
