//! HTTP surfaces for the broker and telco roles.
//!
//! Both roles share the JSON error body (`{error, error_description}`), the `/healthz` and
//! `/readyz` probes, and graceful shutdown on SIGINT/SIGTERM.

pub mod broker;
pub mod health;
pub mod response;
pub mod telco;

pub use broker::*;
pub use health::*;
pub use response::*;
pub use telco::*;

// std
use std::net::SocketAddr;
// crates.io
use axum::Router;
use tokio::net::TcpListener;

/// Binds `addr` and serves `app` alongside the health probes until a shutdown signal arrives.
pub async fn serve(addr: SocketAddr, app: Router, readiness: Readiness) -> std::io::Result<()> {
	let listener = TcpListener::bind(addr).await?;
	let app = app.merge(health_router(readiness.clone()));

	tracing::info!(address = %listener.local_addr()?, "server listening");

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(readiness)).await?;

	tracing::info!("server stopped");

	Ok(())
}
