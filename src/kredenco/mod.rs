pub mod credentials;
pub mod handlers;
pub mod protector;
pub mod store;

use crate::cli::globals::GlobalArgs;
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use credentials::CredentialManager;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Build the application router around one Credential Manager.
pub fn router(manager: Arc<CredentialManager>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/user/register", post(handlers::register))
        .route("/user/login", post(handlers::login))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(manager))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(store::PgStore::new(pool));
    let transit = Arc::new(protector::TransitProtector::new(globals.clone()));
    let manager = Arc::new(CredentialManager::new(store, transit));

    let app = router(manager);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on port {}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
