//! RM Contents · Adaptive problem selection and weakness diagnosis backend
//!
//! - Axum HTTP API
//! - Optional external regression service (via environment variables)
//! - Built-in demo catalog when no problems are configured
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   REGRESSION_API_URL  : enables the external regression service if present
//!   ENGINE_CONFIG_PATH  : path to TOML config (settings, taxonomy, catalog, exam history)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use rmcontents_backend::routes::build_router;
use rmcontents_backend::state::AppState;
use rmcontents_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (store, regression solver, settings).
  let state = Arc::new(AppState::new());

  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "rmcontents_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "rmcontents_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "rmcontents_backend", error = %e, "Failed to listen for Ctrl-C");
  }
}
