//! Per-request exchange orchestration.
//!
//! A request moves through `Received → Validated → Routed → Exchanged → Verified → Minted` and
//! is then answered. Any stage may fail and short-circuit to an error response; nothing is
//! retried across stages. Retries, if any, live inside the upstream client for a single call.

pub mod request;

pub use request::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	keys::KeyResolver,
	obs::{self, ExchangeOutcome, ExchangeSpan, ExchangeStage},
	tenant::RoutingTable,
	token::{ExtraClaims, MintPayload, TokenClaims, TokenEngine},
	upstream::{TelcoClient, TelcoRegistry},
};

/// Lifetime of broker-issued tokens.
pub const BROKER_TOKEN_TTL: Duration = Duration::minutes(15);
/// Issuer written into broker tokens unless overridden.
pub const DEFAULT_BROKER_ISSUER: &str = "sim-broker";

/// Successful token endpoint response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Signed token.
	pub access_token: String,
	/// Token type label.
	pub token_type: String,
	/// Lifetime in seconds.
	pub expires_in: i64,
}
impl TokenResponse {
	/// Builds a response for `access_token` living `ttl`.
	pub fn new(access_token: String, token_type: &str, ttl: Duration) -> Self {
		Self { access_token, token_type: token_type.to_owned(), expires_in: ttl.whole_seconds() }
	}
}

/// Exchange state after each completed stage.
#[derive(Debug)]
pub enum ExchangeState {
	/// Request passed the entry contract.
	Validated(TokenRequest),
	/// Telco selected.
	Routed {
		/// Validated request.
		request: TokenRequest,
		/// Long-lived client of the owning tenant.
		telco: Arc<TelcoClient>,
	},
	/// Telco access token obtained.
	Exchanged {
		/// Client used for the exchange; also fetches the key set.
		telco: Arc<TelcoClient>,
		/// Telco-issued access token.
		access_token: TokenSecret,
	},
	/// Telco token trusted.
	Verified(TokenClaims),
	/// Broker token issued.
	Minted(String),
}
impl ExchangeState {
	/// Stage label for the state.
	pub fn stage(&self) -> ExchangeStage {
		match self {
			Self::Validated(_) => ExchangeStage::Validated,
			Self::Routed { .. } => ExchangeStage::Routed,
			Self::Exchanged { .. } => ExchangeStage::Exchanged,
			Self::Verified(_) => ExchangeStage::Verified,
			Self::Minted(_) => ExchangeStage::Minted,
		}
	}
}

/// Sequences router, upstream client, key resolver, and engine for each request.
pub struct TokenExchange {
	routing: Arc<RoutingTable>,
	registry: Arc<TelcoRegistry>,
	resolver: Arc<KeyResolver>,
	engine: TokenEngine,
	issuer: String,
	token_ttl: Duration,
}
impl TokenExchange {
	/// Creates an orchestrator minting with `engine`.
	pub fn new(
		routing: Arc<RoutingTable>,
		registry: Arc<TelcoRegistry>,
		resolver: Arc<KeyResolver>,
		engine: TokenEngine,
	) -> Self {
		Self {
			routing,
			registry,
			resolver,
			engine,
			issuer: DEFAULT_BROKER_ISSUER.into(),
			token_ttl: BROKER_TOKEN_TTL,
		}
	}

	/// Overrides the issuer written into broker tokens.
	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = issuer.into();

		self
	}

	/// Engine minting broker tokens.
	pub fn engine(&self) -> &TokenEngine {
		&self.engine
	}

	/// Routing table in use.
	pub fn routing(&self) -> &RoutingTable {
		&self.routing
	}

	/// Runs the full pipeline on a raw HTTP request.
	pub async fn handle(
		&self,
		method: &str,
		content_type: Option<&str>,
		body: &[u8],
	) -> Result<TokenResponse> {
		let span = ExchangeSpan::new();

		span.instrument(async {
			obs::record_exchange_outcome(ExchangeStage::Received, ExchangeOutcome::Attempt);

			let request = TokenRequest::parse(method, content_type, body).inspect_err(|e| {
				tracing::info!(code = e.code(), error = %e, "token request rejected");
				obs::record_exchange_outcome(ExchangeStage::Received, ExchangeOutcome::Failure);
			})?;

			self.drive(ExchangeState::Validated(request), &span).await
		})
		.await
	}

	/// Runs the pipeline on an already validated request.
	pub async fn exchange(&self, request: TokenRequest) -> Result<TokenResponse> {
		let span = ExchangeSpan::new();

		span.instrument(self.drive(ExchangeState::Validated(request), &span)).await
	}

	async fn drive(&self, mut state: ExchangeState, span: &ExchangeSpan) -> Result<TokenResponse> {
		loop {
			let stage = state.stage();

			span.record_stage(stage);
			tracing::debug!(%stage, "exchange advanced");

			if let ExchangeState::Minted(token) = state {
				obs::record_exchange_outcome(stage, ExchangeOutcome::Success);

				return Ok(TokenResponse::new(token, "bearer", self.token_ttl));
			}

			state = match self.step(state, span).await {
				Ok(next) => next,
				Err(e) => {
					tracing::warn!(%stage, status = e.status(), error = %e, "exchange failed");
					obs::record_exchange_outcome(stage, ExchangeOutcome::Failure);

					return Err(e);
				},
			};
		}
	}

	async fn step(&self, state: ExchangeState, span: &ExchangeSpan) -> Result<ExchangeState> {
		let next = match state {
			ExchangeState::Validated(request) => {
				let descriptor = self.routing.route(request.phone.digits())?;
				let telco = self.registry.client_for(&descriptor)?;

				span.record_tenant(&descriptor.tenant);

				ExchangeState::Routed { request, telco }
			},
			ExchangeState::Routed { request, telco } => {
				let access_token = telco.exchange_code(&request.code_exchange()).await?;

				ExchangeState::Exchanged { telco, access_token }
			},
			ExchangeState::Exchanged { telco, access_token } => {
				let key_set_url = telco.descriptor().key_set_endpoint();
				let claims = self
					.engine
					.verify(access_token.expose(), &key_set_url, &self.resolver, telco.as_ref())
					.await?;

				ExchangeState::Verified(claims)
			},
			ExchangeState::Verified(claims) => {
				let payload = MintPayload {
					issuer: self.issuer.clone(),
					subject: claims.subject,
					audience: claims.audience,
					expires_at: self.engine.clock().now() + self.token_ttl,
					extra: ExtraClaims::sim(),
				};

				ExchangeState::Minted(self.engine.mint(&payload)?)
			},
			minted @ ExchangeState::Minted(_) => minted,
		};

		Ok(next)
	}
}
impl Debug for TokenExchange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchange")
			.field("issuer", &self.issuer)
			.field("token_ttl", &self.token_ttl)
			.field("tenants", &self.registry.len())
			.finish()
	}
}
