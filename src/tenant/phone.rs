//! E.164 validation and normalization.

// self
use crate::{_prelude::*, error::ClientError};

// Three-digit inputs such as `+123` are rejected: they can hold a country code but no
// subscriber number.
const E164_MIN_DIGITS: usize = 4;
const E164_MAX_DIGITS: usize = 15;

/// Returns true when `phone` is an optional `+`, a leading digit 1-9, and 3-14 further digits.
///
/// No trimming happens here; surrounding whitespace makes the number invalid.
pub fn is_valid_e164(phone: &str) -> bool {
	let digits = phone.strip_prefix('+').unwrap_or(phone);
	let bytes = digits.as_bytes();

	match bytes.first() {
		Some(b'1'..=b'9') => {},
		_ => return false,
	}

	(E164_MIN_DIGITS..=E164_MAX_DIGITS).contains(&bytes.len()) && bytes.iter().all(u8::is_ascii_digit)
}

/// Trims whitespace and drops a leading `+`.
pub fn normalize_phone(phone: &str) -> &str {
	let trimmed = phone.trim();

	trimmed.strip_prefix('+').unwrap_or(trimmed)
}

/// Phone number that passed E.164 validation, stored without the leading `+`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);
impl PhoneNumber {
	/// Validates and normalizes a raw phone number.
	pub fn parse(raw: &str) -> Result<Self, ClientError> {
		if !is_valid_e164(raw) {
			return Err(ClientError::InvalidPhone);
		}

		Ok(Self(normalize_phone(raw).to_owned()))
	}

	/// Digits only, without the `+`.
	pub fn digits(&self) -> &str {
		&self.0
	}
}
impl Debug for PhoneNumber {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Keep the country/operator part visible for debugging, mask the subscriber.
		let visible = self.0.len().min(5);

		write!(f, "PhoneNumber(+{}{})", &self.0[..visible], "*".repeat(self.0.len() - visible))
	}
}
impl Display for PhoneNumber {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "+{}", self.0)
	}
}
impl FromStr for PhoneNumber {
	type Err = ClientError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
