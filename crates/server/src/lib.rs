//! # docchat-server
//!
//! The thin HTTP surface over the `docchat` library: configuration loading,
//! shared state construction, routing, and error-to-status mapping.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod router;
pub mod state;

use crate::{config::AppConfig, router::create_router, state::build_app_state};
use tracing::info;

/// Builds the application and serves it on the given listener.
pub async fn run(listener: tokio::net::TcpListener, config: AppConfig) -> anyhow::Result<()> {
    let app_state = build_app_state(config).await?;
    let app = create_router(app_state);

    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
