//! HTTP Basic client credentials (RFC 7617) used on telco token endpoints.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::TokenSecret};

const BASIC_SCHEME: &str = "Basic ";

/// Client identifier + secret pair presented to a token endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
}
impl ClientCredentials {
	/// Creates a credential pair.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<TokenSecret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into() }
	}

	/// Parses an `Authorization: Basic ...` header value.
	///
	/// Returns `None` for other schemes, invalid base64, or a payload without a colon.
	pub fn from_basic_header(value: &str) -> Option<Self> {
		let encoded = value
			.get(..BASIC_SCHEME.len())
			.filter(|scheme| scheme.eq_ignore_ascii_case(BASIC_SCHEME))
			.map(|_| value[BASIC_SCHEME.len()..].trim())?;
		let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
		let (id, secret) = decoded.split_once(':')?;

		Some(Self::new(id, secret))
	}

	/// Renders the credentials as an `Authorization` header value.
	pub fn to_basic_header(&self) -> String {
		let raw = format!("{}:{}", self.client_id, self.client_secret.expose());

		format!("{BASIC_SCHEME}{}", STANDARD.encode(raw))
	}

	/// Compares two credential pairs through SHA-256 digests so the comparison time does not
	/// depend on how many leading bytes match.
	pub fn matches(&self, expected: &Self) -> bool {
		let id = digest_eq(self.client_id.as_bytes(), expected.client_id.as_bytes());
		let secret = digest_eq(
			self.client_secret.expose().as_bytes(),
			expected.client_secret.expose().as_bytes(),
		);

		id & secret
	}
}

fn digest_eq(lhs: &[u8], rhs: &[u8]) -> bool {
	let lhs = Sha256::digest(lhs);
	let rhs = Sha256::digest(rhs);

	lhs.iter().zip(rhs.iter()).fold(0_u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
