//! Simulated telco identity provider: a key-set endpoint and a token endpoint.

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::{
		HeaderMap, Method,
		header::{AUTHORIZATION, CONTENT_TYPE},
	},
	response::{IntoResponse, Response},
	routing::any,
};
// self
use crate::{
	_prelude::*,
	auth::ClientCredentials,
	error::ClientError,
	exchange::{FORM_CONTENT_TYPE, FormFields, TokenResponse},
	server::ApiError,
	tenant::{KEY_SET_PATH, TOKEN_PATH},
	token::{Audience, TokenEngine},
};

/// Lifetime of telco-issued tokens.
pub const TELCO_TOKEN_TTL: Duration = Duration::hours(1);
/// Challenge sent with 401 responses.
pub const TELCO_REALM: &str = r#"Basic realm="telco""#;

/// Shared handler state for the telco router.
#[derive(Clone, Debug)]
pub struct TelcoState {
	engine: TokenEngine,
	credentials: ClientCredentials,
	issuer: String,
}
impl TelcoState {
	/// Telco signing with `engine`, accepting only `credentials`.
	pub fn new(engine: TokenEngine, credentials: ClientCredentials, issuer: impl Into<String>) -> Self {
		Self { engine, credentials, issuer: issuer.into() }
	}
}

/// Builds the telco router.
pub fn telco_router(state: TelcoState) -> Router {
	Router::new()
		.route(&format!("/{KEY_SET_PATH}"), any(key_set))
		.route(&format!("/{TOKEN_PATH}"), any(token))
		.with_state(state)
}

async fn key_set(State(state): State<TelcoState>, method: Method) -> Response {
	if method != Method::GET {
		return reject(ClientError::MethodNotAllowed { method: method.to_string() });
	}

	Json(state.engine.key_set()).into_response()
}

async fn token(
	State(state): State<TelcoState>,
	method: Method,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	match issue(&state, &method, &headers, &body) {
		Ok(response) => Json(response).into_response(),
		Err(e) => {
			let response = ApiError::from_error(&e, true);

			if matches!(e, Error::Client(ClientError::Unauthorized)) {
				response.with_challenge(TELCO_REALM).into_response()
			} else {
				response.into_response()
			}
		},
	}
}

fn issue(
	state: &TelcoState,
	method: &Method,
	headers: &HeaderMap,
	body: &[u8],
) -> Result<TokenResponse> {
	if method != Method::POST {
		return Err(ClientError::MethodNotAllowed { method: method.to_string() }.into());
	}

	let content_type = headers
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or_default();

	if !content_type.starts_with(FORM_CONTENT_TYPE) {
		return Err(ClientError::UnsupportedMediaType { content_type: content_type.into() }.into());
	}

	let form = FormFields::decode(body)?;
	let presented = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(ClientCredentials::from_basic_header)
		.unwrap_or_else(|| {
			ClientCredentials::new(form.get("client_id"), form.get("client_secret"))
		});

	if !presented.matches(&state.credentials) {
		tracing::info!(client_id = %presented.client_id, "telco rejected client credentials");

		return Err(ClientError::Unauthorized.into());
	}

	let (grant_type, code) = (form.get("grant_type"), form.get("code"));

	if grant_type.is_empty() || code.is_empty() {
		return Err(ClientError::InvalidRequest { reason: "grant_type and code required".into() }
			.into());
	}

	let token = state
		.engine
		.sign(&state.issuer, code, Audience::single(presented.client_id), TELCO_TOKEN_TTL)
		.inspect_err(|e| tracing::error!(error = %e, "telco token signing failed"))?;

	Ok(TokenResponse::new(token, "Bearer", TELCO_TOKEN_TTL))
}

fn reject(err: ClientError) -> Response {
	ApiError::from_error(&Error::from(err), true).into_response()
}
