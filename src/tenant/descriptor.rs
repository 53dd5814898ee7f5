//! Static telco metadata owned by the routing table.

// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, TenantId, TokenSecret},
	tenant::RoutingError,
};

/// Path of the telco token endpoint relative to its base URL.
pub const TOKEN_PATH: &str = "token";
/// Path of the telco key-set document relative to its base URL.
pub const KEY_SET_PATH: &str = ".well-known/jwks.json";

/// Non-empty run of ASCII digits identifying the numbers a telco owns.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);
impl Prefix {
	/// Validates a prefix.
	pub fn new(value: impl AsRef<str>) -> Result<Self, RoutingError> {
		let value = value.as_ref();

		if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
			return Err(RoutingError::InvalidPrefix { prefix: value.to_owned() });
		}

		Ok(Self(value.to_owned()))
	}

	/// Number of digits in the prefix.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Always false; prefixes are validated non-empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true when the normalized number starts with this prefix.
	pub fn matches(&self, normalized_phone: &str) -> bool {
		normalized_phone.starts_with(&self.0)
	}

	/// Prefix digits.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for Prefix {
	type Error = RoutingError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<Prefix> for String {
	fn from(value: Prefix) -> Self {
		value.0
	}
}
impl Debug for Prefix {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Prefix({})", self.0)
	}
}
impl Display for Prefix {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Immutable telco descriptor: which numbers it owns, where it lives, and how to authenticate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelcoDescriptor {
	/// Number prefix owned by the telco.
	pub prefix: Prefix,
	/// Tenant grouping; prefixes sharing a tenant share one upstream client.
	pub tenant: TenantId,
	/// Base URL that hosts `/token` and `/.well-known/jwks.json`.
	pub base_url: Url,
	/// OAuth client identifier issued to the broker by the telco.
	pub client_id: String,
	/// OAuth client secret issued to the broker by the telco.
	pub client_secret: TokenSecret,
}
impl TelcoDescriptor {
	/// Creates a descriptor whose tenant is the prefix itself.
	pub fn new(
		prefix: Prefix,
		base_url: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
	) -> Result<Self, RoutingError> {
		let tenant = TenantId::new(prefix.as_str())
			.map_err(|_| RoutingError::InvalidPrefix { prefix: prefix.to_string() })?;

		Ok(Self {
			prefix,
			tenant,
			base_url,
			client_id: client_id.into(),
			client_secret: client_secret.into(),
		})
	}

	/// Overrides the tenant grouping.
	pub fn with_tenant(mut self, tenant: TenantId) -> Self {
		self.tenant = tenant;

		self
	}

	/// Credentials presented on the token endpoint.
	pub fn credentials(&self) -> ClientCredentials {
		ClientCredentials::new(self.client_id.clone(), self.client_secret.clone())
	}

	/// Token endpoint (`{base_url}/token`).
	pub fn token_endpoint(&self) -> Url {
		join_path(&self.base_url, TOKEN_PATH)
	}

	/// Key-set endpoint (`{base_url}/.well-known/jwks.json`).
	pub fn key_set_endpoint(&self) -> Url {
		join_path(&self.base_url, KEY_SET_PATH)
	}

	/// Returns true when `other` describes the same upstream (endpoint + credentials).
	pub fn same_upstream(&self, other: &Self) -> bool {
		self.base_url == other.base_url
			&& self.client_id == other.client_id
			&& self.client_secret == other.client_secret
	}
}

/// Appends `suffix` to the base path, keeping any path the base already carries.
fn join_path(base: &Url, suffix: &str) -> Url {
	let mut url = base.clone();
	let path = format!("{}/{suffix}", base.path().trim_end_matches('/'));

	url.set_path(&path);
	url.set_query(None);

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn descriptor(base: &str) -> TelcoDescriptor {
		TelcoDescriptor::new(
			Prefix::new("97250").expect("Prefix fixture should be valid."),
			Url::parse(base).expect("Base URL fixture should parse."),
			"client",
			"secret",
		)
		.expect("Descriptor fixture should be valid.")
	}

	#[test]
	fn prefixes_must_be_digits() {
		assert!(Prefix::new("").is_err());
		assert!(Prefix::new("+972").is_err());
		assert!(Prefix::new("97a").is_err());
		assert_eq!(Prefix::new("97205").expect("Digits should be accepted.").len(), 5);
	}

	#[test]
	fn endpoints_extend_the_base_path() {
		let root = descriptor("http://localhost:8081");
		let nested = descriptor("https://telco.example.com/oauth/");

		assert_eq!(root.token_endpoint().as_str(), "http://localhost:8081/token");
		assert_eq!(
			root.key_set_endpoint().as_str(),
			"http://localhost:8081/.well-known/jwks.json"
		);
		assert_eq!(nested.token_endpoint().as_str(), "https://telco.example.com/oauth/token");
		assert_eq!(&*root.tenant, "97250");
	}
}
