//! Rate-limited, breaker-guarded HTTP client for a single telco tenant.

// crates.io
use jsonwebtoken::jwk::JwkSet;
use reqwest::{
	RequestBuilder, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	clock::SharedClock,
	error::{ConfigError, UpstreamError},
	keys::{KeySetFetcher, KeySetFuture},
	tenant::TelcoDescriptor,
	upstream::{CircuitBreaker, RateLimiter, UpstreamSettings},
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";
const BODY_PREVIEW_LIMIT: usize = 256;
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Parameters forwarded to the telco token endpoint during a code exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeExchange {
	/// Authorization code issued by the telco.
	pub code: TokenSecret,
	/// Redirect URI used when the code was issued.
	pub redirect_uri: String,
	/// PKCE verifier matching the original challenge.
	pub code_verifier: TokenSecret,
}
impl CodeExchange {
	/// Form-url-encoded body sent to `{base_url}/token`.
	pub fn encode(&self) -> String {
		url::form_urlencoded::Serializer::new(String::new())
			.append_pair("grant_type", "authorization_code")
			.append_pair("code", self.code.expose())
			.append_pair("redirect_uri", &self.redirect_uri)
			.append_pair("code_verifier", self.code_verifier.expose())
			.finish()
	}
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
}

/// Long-lived client bound to one tenant.
///
/// The limiter and breaker live as long as the client, so failure streaks and request budgets
/// are shared by every exchange routed to the tenant.
pub struct TelcoClient {
	descriptor: Arc<TelcoDescriptor>,
	http: ReqwestClient,
	limiter: RateLimiter,
	breaker: CircuitBreaker,
	call_timeout: std::time::Duration,
}
impl TelcoClient {
	/// Creates a client for `descriptor` sharing the provided reqwest connection pool.
	pub fn new(
		descriptor: Arc<TelcoDescriptor>,
		settings: &UpstreamSettings,
		http: ReqwestClient,
		clock: SharedClock,
	) -> Result<Self, ConfigError> {
		settings.validate()?;

		let tenant = descriptor.tenant.clone();

		Ok(Self {
			limiter: RateLimiter::new(tenant.clone(), settings)?,
			breaker: CircuitBreaker::new(tenant, settings, clock),
			call_timeout: settings.call_timeout.unsigned_abs(),
			descriptor,
			http,
		})
	}

	/// Descriptor this client talks to.
	pub fn descriptor(&self) -> &Arc<TelcoDescriptor> {
		&self.descriptor
	}

	/// Breaker guarding this tenant.
	pub fn breaker(&self) -> &CircuitBreaker {
		&self.breaker
	}

	/// Exchanges an authorization code for the telco's access token.
	///
	/// Sends `POST {base_url}/token` with HTTP Basic client credentials and a form body.
	pub async fn exchange_code(&self, exchange: &CodeExchange) -> Result<TokenSecret, UpstreamError> {
		let request = self
			.http
			.post(self.descriptor.token_endpoint())
			.header(AUTHORIZATION, self.descriptor.credentials().to_basic_header())
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(ACCEPT, JSON_CONTENT_TYPE)
			.body(exchange.encode());

		self.call("exchange_code", request, |body| {
			let parsed: TokenEndpointResponse = parse_json(body)?;

			if parsed.access_token.is_empty() {
				return Err(UpstreamError::MalformedBody {
					message: "access_token is empty".into(),
				});
			}

			Ok(TokenSecret::new(parsed.access_token))
		})
		.await
	}

	/// Fetches the JSON key-set document at `url`.
	pub async fn fetch_key_set(&self, url: &Url) -> Result<JwkSet, UpstreamError> {
		let request = self.http.get(url.clone()).header(ACCEPT, JSON_CONTENT_TYPE);

		self.call("fetch_key_set", request, parse_json).await
	}

	async fn call<T, P>(
		&self,
		operation: &'static str,
		request: RequestBuilder,
		parse: P,
	) -> Result<T, UpstreamError>
	where
		P: FnOnce(&[u8]) -> Result<T, UpstreamError>,
	{
		let deadline = Instant::now() + self.call_timeout;

		self.limiter.acquire(deadline).await?;

		let permit = self.breaker.try_acquire().inspect_err(|_| {
			tracing::debug!(tenant = %self.descriptor.tenant, operation, "breaker rejected call");
		})?;
		let result = match tokio::time::timeout_at(deadline, send(request)).await {
			Ok(Ok((status, body))) if status.is_success() => parse(&body),
			Ok(Ok((status, body))) => Err(UpstreamError::Status {
				status: status.as_u16(),
				body: preview(&body),
			}),
			Ok(Err(e)) => Err(e),
			Err(_) => Err(UpstreamError::Timeout),
		};

		match &result {
			Ok(_) => permit.success(),
			Err(e) => {
				tracing::warn!(
					tenant = %self.descriptor.tenant,
					operation,
					error = %e,
					"telco call failed"
				);
				permit.failure();
			},
		}

		result
	}
}
impl KeySetFetcher for TelcoClient {
	fn fetch_key_set<'a>(&'a self, url: &'a Url) -> KeySetFuture<'a> {
		Box::pin(TelcoClient::fetch_key_set(self, url))
	}
}
impl Debug for TelcoClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TelcoClient")
			.field("tenant", &self.descriptor.tenant)
			.field("base_url", &self.descriptor.base_url.as_str())
			.field("breaker", &self.breaker)
			.finish()
	}
}

/// Sends the request and always drains the body, whatever the status.
///
/// At most [`MAX_BODY_BYTES`] are kept; the rest is read and discarded so the connection can
/// be reused.
async fn send(request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), UpstreamError> {
	let mut response = request.send().await?;
	let status = response.status();
	let mut body = Vec::new();
	let mut discarded = 0_usize;

	while let Some(chunk) = response.chunk().await? {
		discarded += chunk.len() - push_capped(&mut body, &chunk, MAX_BODY_BYTES);
	}

	if discarded > 0 {
		tracing::debug!(%status, kept = body.len(), discarded, "telco response body truncated");
	}

	Ok((status, body))
}

/// Appends as much of `chunk` as fits under `limit`, returning the number of bytes kept.
fn push_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> usize {
	let kept = chunk.len().min(limit.saturating_sub(buf.len()));

	buf.extend_from_slice(&chunk[..kept]);

	kept
}

fn parse_json<T>(body: &[u8]) -> Result<T, UpstreamError>
where
	T: for<'de> Deserialize<'de>,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(UpstreamError::malformed)
}

fn preview(body: &[u8]) -> String {
	String::from_utf8_lossy(body).chars().take(BODY_PREVIEW_LIMIT).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn code_exchange_encodes_every_field() {
		let exchange = CodeExchange {
			code: TokenSecret::new("abc 123"),
			redirect_uri: "https://app.example.com/cb?x=1".into(),
			code_verifier: TokenSecret::new("verifier"),
		};

		assert_eq!(
			exchange.encode(),
			"grant_type=authorization_code&code=abc+123\
			 &redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb%3Fx%3D1&code_verifier=verifier"
		);
	}

	#[test]
	fn malformed_json_reports_the_path() {
		let err = parse_json::<TokenEndpointResponse>(br#"{"access_token": 42}"#)
			.err()
			.expect("A numeric access_token should be rejected.");

		match err {
			UpstreamError::MalformedBody { message } => assert!(message.contains("access_token")),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn body_buffer_stops_at_the_cap() {
		let mut buf = Vec::new();

		assert_eq!(push_capped(&mut buf, b"abcd", 6), 4);
		assert_eq!(push_capped(&mut buf, b"efgh", 6), 2);
		assert_eq!(push_capped(&mut buf, b"ijkl", 6), 0);
		assert_eq!(buf, b"abcdef");
	}

	#[test]
	fn preview_truncates_long_bodies() {
		let body = "x".repeat(1_000);

		assert_eq!(preview(body.as_bytes()).len(), BODY_PREVIEW_LIMIT);
	}
}
