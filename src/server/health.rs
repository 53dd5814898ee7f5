//! Liveness and readiness probes plus signal-driven graceful shutdown.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use axum::{Router, extract::State, http::StatusCode, routing::get};
// self
use crate::_prelude::*;

/// Readiness flag; flips to "not ready" once shutdown begins.
#[derive(Clone, Debug)]
pub struct Readiness(Arc<AtomicBool>);
impl Readiness {
	/// Creates a flag in the ready state.
	pub fn new() -> Self {
		Self(Arc::new(AtomicBool::new(true)))
	}

	/// Returns true while the server accepts traffic.
	pub fn is_ready(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}

	/// Updates the flag.
	pub fn set_ready(&self, ready: bool) {
		self.0.store(ready, Ordering::Release);
	}
}
impl Default for Readiness {
	fn default() -> Self {
		Self::new()
	}
}

/// `/healthz` (always `200 OK`) and `/readyz` (`200 OK` until shutdown, then `503`).
pub fn health_router(readiness: Readiness) -> Router {
	Router::new()
		.route("/healthz", get(|| async { (StatusCode::OK, "OK") }))
		.route("/readyz", get(readyz))
		.with_state(readiness)
}

async fn readyz(State(readiness): State<Readiness>) -> (StatusCode, &'static str) {
	if readiness.is_ready() {
		(StatusCode::OK, "OK")
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, "")
	}
}

/// Resolves on SIGINT or SIGTERM and marks the process as not ready.
pub async fn shutdown_signal(readiness: Readiness) {
	let interrupt = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for SIGINT");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = interrupt => {},
		_ = terminate => {},
	}

	readiness.set_ready(false);
	tracing::info!("shutdown signal received; draining connections");
}
