//! Broker role HTTP surface: `POST /token`.

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::{HeaderMap, Method, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
	routing::any,
};
// self
use crate::{_prelude::*, exchange::TokenExchange, server::ApiError};

/// Shared handler state for the broker router.
#[derive(Clone, Debug)]
pub struct BrokerState {
	exchange: Arc<TokenExchange>,
	expose_error_details: bool,
}
impl BrokerState {
	/// Wraps the orchestrator; error details stay redacted.
	pub fn new(exchange: Arc<TokenExchange>) -> Self {
		Self { exchange, expose_error_details: false }
	}

	/// Toggles raw upstream and internal error text in responses.
	pub fn with_error_details(mut self, expose: bool) -> Self {
		self.expose_error_details = expose;

		self
	}
}

/// Builds the broker router.
///
/// `/token` accepts every method so that method and content-type rejections use the broker's
/// own JSON error bodies.
pub fn broker_router(state: BrokerState) -> Router {
	Router::new().route("/token", any(token)).with_state(state)
}

async fn token(
	State(state): State<BrokerState>,
	method: Method,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());

	match state.exchange.handle(method.as_str(), content_type, &body).await {
		Ok(response) => Json(response).into_response(),
		Err(e) => ApiError::from_error(&e, state.expose_error_details).into_response(),
	}
}
