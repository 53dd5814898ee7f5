//! Validated identifiers for tenants and signing keys.
//!
//! Tenant ids end up in log fields, span fields and metric labels, so they are restricted to
//! a label-safe alphabet. Key ids are copied verbatim from configuration or derived from a
//! key thumbprint and only need to be printable ASCII.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

struct IdRules {
	kind: &'static str,
	max_len: usize,
	allowed: fn(char) -> bool,
}

const TENANT_RULES: IdRules = IdRules {
	kind: "Tenant",
	max_len: 64,
	allowed: |c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'),
};
const KEY_RULES: IdRules =
	IdRules { kind: "Key", max_len: 256, allowed: |c| c.is_ascii_graphic() };

macro_rules! def_id {
	($name:ident, $rules:ident, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps `value`.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let value = value.as_ref();

				$rules.check(value)?;

				Ok(Self(value.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$rules.check(&value)?;

				Ok(Self(value))
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $rules.kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

def_id! { TenantId, TENANT_RULES, "Telco tenant; keys the registry of long-lived upstream clients." }
def_id! { KeyId, KEY_RULES, "Key identifier (`kid`) written to token headers and key sets." }

impl IdRules {
	fn check(&self, value: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if value.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if value.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}
		if let Some(character) = value.chars().find(|c| !(self.allowed)(*c)) {
			return Err(IdentifierError::InvalidCharacter { kind, character });
		}

		Ok(())
	}
}

/// Identifier validation failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind.
		kind: &'static str,
	},
	/// The identifier contains a character outside its alphabet.
	#[error("{kind} identifier contains the disallowed character {character:?}.")]
	InvalidCharacter {
		/// Identifier kind.
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The identifier is longer than its kind allows.
	#[error("{kind} identifier exceeds {max} bytes.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Maximum length in bytes.
		max: usize,
	},
}
