//! JSON error bodies shared by the broker and telco routers.

// crates.io
use axum::{
	Json,
	http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
	response::{IntoResponse, Response},
};
// self
use crate::_prelude::*;

/// `{error, error_description}` body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Stable error code.
	pub error: String,
	/// Human-readable detail.
	pub error_description: String,
}

/// Error response ready to be returned from a handler.
#[derive(Clone, Debug)]
pub struct ApiError {
	status: StatusCode,
	body: ErrorBody,
	challenge: Option<&'static str>,
}
impl ApiError {
	/// Maps a broker error onto its status and body.
	///
	/// Client errors always carry their message. Upstream, trust, and internal failures carry a
	/// generic description unless `expose_details` is set.
	pub fn from_error(err: &Error, expose_details: bool) -> Self {
		let description = match err {
			Error::Client(e) => e.to_string(),
			_ if expose_details => err.to_string(),
			_ => err.redacted_description(),
		};
		let status =
			StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		Self {
			status,
			body: ErrorBody { error: err.code().into(), error_description: description },
			challenge: None,
		}
	}

	/// Adds a `WWW-Authenticate` challenge to the response.
	pub fn with_challenge(mut self, challenge: &'static str) -> Self {
		self.challenge = Some(challenge);

		self
	}

	/// Response status.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Response body.
	pub fn body(&self) -> &ErrorBody {
		&self.body
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let mut response = (self.status, Json(self.body)).into_response();

		if let Some(challenge) = self.challenge {
			response.headers_mut().insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
		}

		response
	}
}
