//! Claim sets carried by telco and broker tokens.

// std
use std::collections::BTreeSet;
// crates.io
use serde::Deserializer;
use serde_json::Value;
// self
use crate::_prelude::*;

/// Set of intended token recipients.
///
/// Accepts both the single-string and the array form on input, always emits an array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Audience(BTreeSet<String>);
impl Audience {
	/// Builds an audience from any iterator of strings.
	pub fn new<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(values.into_iter().map(Into::into).collect())
	}

	/// Audience with a single recipient.
	pub fn single(value: impl Into<String>) -> Self {
		Self(BTreeSet::from([value.into()]))
	}

	/// Returns true when `value` is one of the recipients.
	pub fn contains(&self, value: &str) -> bool {
		self.0.contains(value)
	}

	/// Iterates recipients in lexical order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Number of recipients.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when the audience is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<'de> Deserialize<'de> for Audience {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			One(String),
			Many(BTreeSet<String>),
		}

		Ok(match Raw::deserialize(deserializer)? {
			Raw::One(value) => Self::single(value),
			Raw::Many(values) => Self(values),
		})
	}
}
impl<S> FromIterator<S> for Audience
where
	S: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = S>,
	{
		Self::new(iter)
	}
}

/// How the subject proved their identity to the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
	/// Silent SIM-based authentication through a telco.
	Sim,
	/// Any value this build does not recognize.
	#[serde(other)]
	Unknown,
}

/// Extension claims nested under the `extra` key.
///
/// Known fields are typed; anything else lands in [`ExtraClaims::other`] untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraClaims {
	/// Authentication method flag.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth_method: Option<AuthMethod>,
	/// Unrecognized extension claims.
	#[serde(flatten)]
	pub other: BTreeMap<String, Value>,
}
impl ExtraClaims {
	/// Extension claims flagging SIM authentication.
	pub fn sim() -> Self {
		Self { auth_method: Some(AuthMethod::Sim), ..Default::default() }
	}

	/// Returns true when no extension claim is set.
	pub fn is_empty(&self) -> bool {
		self.auth_method.is_none() && self.other.is_empty()
	}
}

/// Decoded token body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// `iss`
	#[serde(rename = "iss")]
	pub issuer: String,
	/// `sub`
	#[serde(rename = "sub")]
	pub subject: String,
	/// `aud`
	#[serde(rename = "aud", default, skip_serializing_if = "Audience::is_empty")]
	pub audience: Audience,
	/// `iat`, in Unix seconds.
	#[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
	pub issued_at: Option<i64>,
	/// `exp`, in Unix seconds.
	#[serde(rename = "exp")]
	pub expires_at: i64,
	/// Extension claims.
	#[serde(default, skip_serializing_if = "ExtraClaims::is_empty")]
	pub extra: ExtraClaims,
}
impl TokenClaims {
	/// Expiry as a timestamp, or `None` when out of range.
	pub fn expiry(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.expires_at).ok()
	}
}

/// Input to [`TokenEngine::mint`](crate::token::TokenEngine::mint).
#[derive(Clone, Debug, PartialEq)]
pub struct MintPayload {
	/// Issuer written to `iss`.
	pub issuer: String,
	/// Subject written to `sub`.
	pub subject: String,
	/// Audience written to `aud`.
	pub audience: Audience,
	/// Absolute expiry written to `exp`.
	pub expires_at: OffsetDateTime,
	/// Extension claims written under `extra`.
	pub extra: ExtraClaims,
}
