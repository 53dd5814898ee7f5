//! Token signing and rotation-aware verification.

// crates.io
use jsonwebtoken::{
	Algorithm, DecodingKey, Header, Validation,
	errors::{Error as JwtError, ErrorKind},
	jwk::JwkSet,
};
// self
use crate::{
	_prelude::*,
	clock::SharedClock,
	error::{InternalError, TrustError},
	keys::{KeyResolver, KeySetFetcher},
	token::{Audience, ExtraClaims, MintPayload, SigningContext, TokenClaims},
};

/// Clock skew tolerated when checking `exp`, in seconds.
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

enum KeyAttempt {
	Verified(TokenClaims),
	Mismatch,
	Rejected(TrustError),
}

/// Signs and verifies tokens with one [`SigningContext`].
#[derive(Clone)]
pub struct TokenEngine {
	context: Arc<SigningContext>,
	clock: SharedClock,
}
impl TokenEngine {
	/// Creates an engine around `context`.
	pub fn new(context: SigningContext, clock: SharedClock) -> Self {
		Self { context: Arc::new(context), clock }
	}

	/// Signing material in use.
	pub fn context(&self) -> &SigningContext {
		&self.context
	}

	/// Clock stamping `iat` and checking `exp`.
	pub fn clock(&self) -> &SharedClock {
		&self.clock
	}

	/// Public key set, empty for symmetric engines.
	pub fn key_set(&self) -> JwkSet {
		self.context.key_set()
	}

	/// Issues a token with standard claims only, expiring `ttl` from now.
	pub fn sign(
		&self,
		issuer: &str,
		subject: &str,
		audience: Audience,
		ttl: Duration,
	) -> Result<String, InternalError> {
		self.mint(&MintPayload {
			issuer: issuer.to_owned(),
			subject: subject.to_owned(),
			audience,
			expires_at: self.clock.now() + ttl,
			extra: ExtraClaims::default(),
		})
	}

	/// Issues a token for `payload`, including its extension claims.
	pub fn mint(&self, payload: &MintPayload) -> Result<String, InternalError> {
		let claims = TokenClaims {
			issuer: payload.issuer.clone(),
			subject: payload.subject.clone(),
			audience: payload.audience.clone(),
			issued_at: Some(self.clock.now().unix_timestamp()),
			expires_at: payload.expires_at.unix_timestamp(),
			extra: payload.extra.clone(),
		};
		let mut header = Header::new(self.context.algorithm());

		header.kid = self.context.key_id().map(ToString::to_string);

		jsonwebtoken::encode(&header, &claims, self.context.encoding_key())
			.map_err(InternalError::Signing)
	}

	/// Verifies an RS256 token against the key set published at `key_set_url`.
	///
	/// Every key currently resolved is tried in order. When none validates the signature the key
	/// set is refreshed exactly once and the keys are tried again; a second miss is terminal.
	pub async fn verify(
		&self,
		token: &str,
		key_set_url: &Url,
		resolver: &KeyResolver,
		fetcher: &dyn KeySetFetcher,
	) -> Result<TokenClaims> {
		let header = jsonwebtoken::decode_header(token)
			.map_err(|e| TrustError::Malformed { message: e.to_string() })?;

		if header.alg != Algorithm::RS256 {
			return Err(
				TrustError::UnsupportedAlgorithm { algorithm: format!("{:?}", header.alg) }.into()
			);
		}

		let validation = self.validation(Algorithm::RS256);
		let cached = resolver.resolve(key_set_url, fetcher).await?;

		if let Some(claims) = self.try_key_set(token, &cached, &validation)? {
			return Ok(claims);
		}

		tracing::info!(
			url = %key_set_url,
			kid = header.kid.as_deref().unwrap_or_default(),
			"no cached key validated the token; refreshing key set"
		);

		let fresh = resolver.force_refresh(key_set_url, fetcher).await?;

		match self.try_key_set(token, &fresh, &validation)? {
			Some(claims) => Ok(claims),
			None => {
				tracing::warn!(url = %key_set_url, "token signature invalid after key set refresh");

				Err(TrustError::NoMatchingKey.into())
			},
		}
	}

	/// Verifies a token this engine issued, using its own key and algorithm.
	pub fn verify_issued(&self, token: &str) -> Result<TokenClaims, TrustError> {
		let validation = self.validation(self.context.algorithm());

		match self.try_key(token, self.context.decoding_key(), &validation) {
			KeyAttempt::Verified(claims) => Ok(claims),
			KeyAttempt::Mismatch => Err(TrustError::NoMatchingKey),
			KeyAttempt::Rejected(e) => Err(e),
		}
	}

	fn validation(&self, algorithm: Algorithm) -> Validation {
		let mut validation = Validation::new(algorithm);

		// Expiry is checked against the injected clock instead.
		validation.validate_exp = false;
		validation.validate_aud = false;

		validation
	}

	fn try_key_set(
		&self,
		token: &str,
		key_set: &JwkSet,
		validation: &Validation,
	) -> Result<Option<TokenClaims>, TrustError> {
		for jwk in &key_set.keys {
			let key = match DecodingKey::from_jwk(jwk) {
				Ok(key) => key,
				Err(e) => {
					tracing::debug!(kid = ?jwk.common.key_id, error = %e, "skipping unusable key");

					continue;
				},
			};

			match self.try_key(token, &key, validation) {
				KeyAttempt::Verified(claims) => return Ok(Some(claims)),
				KeyAttempt::Mismatch => continue,
				KeyAttempt::Rejected(e) => return Err(e),
			}
		}

		Ok(None)
	}

	fn try_key(&self, token: &str, key: &DecodingKey, validation: &Validation) -> KeyAttempt {
		let claims = match jsonwebtoken::decode::<TokenClaims>(token, key, validation) {
			Ok(data) => data.claims,
			Err(e) => return classify(e),
		};

		let now = self.clock.now().unix_timestamp();

		if claims.expires_at.saturating_add(EXPIRY_LEEWAY_SECS) < now {
			return KeyAttempt::Rejected(TrustError::InvalidClaims {
				message: "token has expired".into(),
			});
		}

		KeyAttempt::Verified(claims)
	}
}
impl Debug for TokenEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEngine").field("context", &self.context).finish()
	}
}

fn classify(err: JwtError) -> KeyAttempt {
	match err.kind() {
		ErrorKind::InvalidSignature
		| ErrorKind::InvalidRsaKey(_)
		| ErrorKind::InvalidKeyFormat
		| ErrorKind::InvalidAlgorithm
		| ErrorKind::Crypto(_) => KeyAttempt::Mismatch,
		ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) =>
			KeyAttempt::Rejected(TrustError::Malformed { message: err.to_string() }),
		_ => KeyAttempt::Rejected(TrustError::InvalidClaims { message: err.to_string() }),
	}
}
