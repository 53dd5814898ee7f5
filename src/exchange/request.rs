//! Inbound `/token` request parsing and validation.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::ClientError,
	tenant::PhoneNumber,
	upstream::CodeExchange,
};

/// Only grant accepted by the broker.
pub const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";
/// Content type the broker and telco token endpoints accept.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Validated token request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
	/// Subscriber phone number used for routing.
	pub phone: PhoneNumber,
	/// Authorization code issued by the telco.
	pub code: TokenSecret,
	/// Redirect URI forwarded verbatim to the telco (may be empty).
	pub redirect_uri: String,
	/// PKCE verifier forwarded verbatim to the telco (may be empty).
	pub code_verifier: TokenSecret,
}
impl TokenRequest {
	/// Validates the raw request in entry-contract order.
	///
	/// Checks run as: method, content type, form decoding, grant type, code presence, phone
	/// shape. The first failure wins.
	pub fn parse(
		method: &str,
		content_type: Option<&str>,
		body: &[u8],
	) -> Result<Self, ClientError> {
		if !method.eq_ignore_ascii_case("POST") {
			return Err(ClientError::MethodNotAllowed { method: method.to_owned() });
		}

		let content_type = content_type.unwrap_or_default();

		if !content_type.starts_with(FORM_CONTENT_TYPE) {
			return Err(ClientError::UnsupportedMediaType { content_type: content_type.to_owned() });
		}

		let form = FormFields::decode(body)?;
		let grant_type = form.get("grant_type");

		if grant_type != AUTHORIZATION_CODE_GRANT {
			return Err(ClientError::UnsupportedGrantType { grant_type: grant_type.to_owned() });
		}

		let code = form.get("code");

		if code.is_empty() {
			return Err(ClientError::InvalidRequest { reason: "code is required".into() });
		}

		Ok(Self {
			phone: PhoneNumber::parse(form.get("phone"))?,
			code: TokenSecret::new(code),
			redirect_uri: form.get("redirect_uri").to_owned(),
			code_verifier: TokenSecret::new(form.get("code_verifier")),
		})
	}

	/// Parameters forwarded to the telco token endpoint.
	pub fn code_exchange(&self) -> CodeExchange {
		CodeExchange {
			code: self.code.clone(),
			redirect_uri: self.redirect_uri.clone(),
			code_verifier: self.code_verifier.clone(),
		}
	}
}

/// Decoded form body; the first occurrence of a key wins.
#[derive(Debug, Default)]
pub struct FormFields(HashMap<String, String>);
impl FormFields {
	/// Decodes a form-url-encoded body.
	pub fn decode(body: &[u8]) -> Result<Self, ClientError> {
		if std::str::from_utf8(body).is_err() {
			return Err(ClientError::InvalidRequest { reason: "body is not valid UTF-8".into() });
		}

		let mut fields = HashMap::new();

		for (key, value) in url::form_urlencoded::parse(body) {
			fields.entry(key.into_owned()).or_insert_with(|| value.into_owned());
		}

		Ok(Self(fields))
	}

	/// Value for `key`, empty when absent.
	pub fn get(&self, key: &str) -> &str {
		self.0.get(key).map(String::as_str).unwrap_or_default()
	}
}
