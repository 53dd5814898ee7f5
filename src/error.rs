//! Broker-level error taxonomy shared by routing, upstream calls, verification, and minting.
//!
//! Every failure an exchange can hit falls into one of four families, each with a fixed HTTP
//! status class: [`ClientError`] (4xx), [`UpstreamError`] (502), [`TrustError`] (502), and
//! [`InternalError`] (500). [`ConfigError`] covers startup problems and never reaches a client
//! during normal operation.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller sent a request the broker refuses to process.
	#[error(transparent)]
	Client(#[from] ClientError),
	/// A telco dependency failed or was short-circuited.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// The telco token could not be trusted.
	#[error(transparent)]
	Trust(#[from] TrustError),
	/// The broker failed to produce its own token.
	#[error(transparent)]
	Internal(#[from] InternalError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// HTTP status code associated with the error family.
	pub fn status(&self) -> u16 {
		match self {
			Self::Client(e) => e.status(),
			Self::Upstream(_) | Self::Trust(_) => 502,
			Self::Internal(_) | Self::Config(_) => 500,
		}
	}

	/// Stable OAuth-style error code used in JSON error bodies.
	pub fn code(&self) -> &'static str {
		match self {
			Self::Client(e) => e.code(),
			Self::Upstream(_) => "upstream_unavailable",
			Self::Trust(_) => "invalid_upstream_token",
			Self::Internal(_) | Self::Config(_) => "server_error",
		}
	}

	/// Generic description that never leaks upstream or internal details.
	pub fn redacted_description(&self) -> String {
		match self {
			Self::Client(e) => e.to_string(),
			Self::Upstream(_) => "The telco could not complete the exchange.".into(),
			Self::Trust(_) => "The telco token could not be verified.".into(),
			Self::Internal(_) | Self::Config(_) => "The broker could not issue a token.".into(),
		}
	}
}

/// Request-level rejections, all surfaced as 4xx responses.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClientError {
	/// Only POST is accepted on the endpoint.
	#[error("Method {method} is not allowed.")]
	MethodNotAllowed {
		/// Method the caller used.
		method: String,
	},
	/// Body must be form-url-encoded.
	#[error("Content type `{content_type}` is not supported.")]
	UnsupportedMediaType {
		/// Content type the caller declared (empty when absent).
		content_type: String,
	},
	/// Form body is missing a field or cannot be decoded.
	#[error("Invalid request: {reason}.")]
	InvalidRequest {
		/// Human-readable reason.
		reason: String,
	},
	/// Only `authorization_code` is accepted.
	#[error("Grant type `{grant_type}` is not supported; only authorization_code is.")]
	UnsupportedGrantType {
		/// Grant type the caller asked for.
		grant_type: String,
	},
	/// Phone number is not E.164 shaped.
	#[error("Only E.164 phone numbers are supported.")]
	InvalidPhone,
	/// No telco owns the phone number.
	#[error("No telco prefix matches `{phone}`.")]
	NoRouteFound {
		/// Normalized phone number.
		phone: String,
	},
	/// Client credentials are missing or wrong.
	#[error("Client authentication failed.")]
	Unauthorized,
}
impl ClientError {
	/// HTTP status code for the rejection.
	pub fn status(&self) -> u16 {
		match self {
			Self::MethodNotAllowed { .. } => 405,
			Self::UnsupportedMediaType { .. } => 415,
			Self::Unauthorized => 401,
			_ => 400,
		}
	}

	/// Stable error code for the rejection.
	pub fn code(&self) -> &'static str {
		match self {
			Self::MethodNotAllowed { .. } => "method_not_allowed",
			Self::UnsupportedMediaType { .. } => "unsupported_media_type",
			Self::InvalidRequest { .. } => "invalid_request",
			Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
			Self::InvalidPhone => "invalid_phone_number",
			Self::NoRouteFound { .. } => "unknown_phone_prefix",
			Self::Unauthorized => "invalid_client",
		}
	}
}

/// Failures raised by the resilient upstream client.
///
/// The type is `Clone` so a single coalesced key-set fetch can hand the same failure to every
/// waiting caller.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UpstreamError {
	/// The rate limiter did not grant a permit before the call deadline.
	#[error("Rate limiter for tenant `{tenant}` did not grant a permit before the deadline.")]
	RateLimited {
		/// Tenant whose budget was exhausted.
		tenant: String,
	},
	/// The circuit breaker is open (or its half-open trial is already in flight).
	#[error("Circuit breaker for tenant `{tenant}` is open.")]
	CircuitOpen {
		/// Tenant whose breaker rejected the call.
		tenant: String,
	},
	/// The telco answered with a non-success status.
	#[error("Telco responded with HTTP {status}: {body}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body: String,
	},
	/// The call exceeded its deadline.
	#[error("Telco call timed out.")]
	Timeout,
	/// DNS, TCP, TLS, or other transport failure.
	#[error("Network error while calling the telco: {message}.")]
	Transport {
		/// Transport error text.
		message: String,
	},
	/// The telco answered 2xx but the body could not be parsed.
	#[error("Telco returned a malformed body: {message}.")]
	MalformedBody {
		/// Parse error including the JSON path.
		message: String,
	},
}
impl UpstreamError {
	/// Builds a [`UpstreamError::MalformedBody`] from a path-aware JSON failure.
	pub fn malformed(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::MalformedBody { message: err.to_string() }
	}
}
impl From<ReqwestError> for UpstreamError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::Transport { message: e.to_string() } }
	}
}

/// Reasons a telco token is rejected at the trust boundary.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TrustError {
	/// The token is not a well-formed compact JWS.
	#[error("Token is malformed: {message}.")]
	Malformed {
		/// Parser error text.
		message: String,
	},
	/// The token header names an algorithm other than RS256.
	#[error("Token algorithm {algorithm} is not accepted.")]
	UnsupportedAlgorithm {
		/// Algorithm announced in the header.
		algorithm: String,
	},
	/// No key validated the signature, even after a forced key-set refresh.
	#[error("Invalid token signature after key-set refresh.")]
	NoMatchingKey,
	/// The signature is valid but the claims are not acceptable.
	#[error("Token claims are invalid: {message}.")]
	InvalidClaims {
		/// Validation error text.
		message: String,
	},
}

/// Failures producing broker-signed tokens.
#[derive(Debug, ThisError)]
pub enum InternalError {
	/// Token serialization or signing failed.
	#[error("Token signing failed.")]
	Signing(#[source] jsonwebtoken::errors::Error),
	/// RSA key generation or encoding failed.
	#[error("Signing key could not be generated.")]
	KeyGeneration {
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
}
impl InternalError {
	/// Wraps a key generation failure.
	pub fn key_generation(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::KeyGeneration { source: Box::new(src) }
	}
}

/// Configuration and validation failures raised while building the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Required environment variable is absent or empty.
	#[error("Environment variable {name} is required.")]
	MissingEnv {
		/// Variable name.
		name: String,
	},
	/// Environment variable is present but unusable.
	#[error("Environment variable {name} is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		name: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// `.env` file exists but could not be loaded.
	#[error("The .env file could not be loaded.")]
	DotEnv(#[from] dotenvy::Error),
	/// Prefix map file could not be read.
	#[error("Prefix map `{path}` could not be read.")]
	PrefixMapRead {
		/// File path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Prefix map file is empty.
	#[error("Prefix map is empty.")]
	EmptyPrefixMap,
	/// Prefix map YAML could not be parsed.
	#[error("Prefix map could not be parsed.")]
	PrefixMapParse(#[from] serde_yaml::Error),
	/// A routing prefix is malformed or duplicated.
	#[error(transparent)]
	Routing(#[from] crate::tenant::RoutingError),
	/// Tenant identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Two prefixes share a tenant but disagree on its endpoint or credentials.
	#[error("Tenant `{tenant}` is declared with conflicting settings.")]
	ConflictingTenant {
		/// Tenant identifier.
		tenant: String,
	},
	/// A rate limit or breaker setting is out of range.
	#[error("Upstream setting `{setting}` must be positive.")]
	InvalidUpstreamSetting {
		/// Setting name.
		setting: &'static str,
	},
	/// Symmetric signing secret is empty.
	#[error("Signing secret cannot be empty.")]
	EmptySigningSecret,
	/// A URL in configuration could not be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Raw value.
		value: String,
		/// Underlying parse failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
