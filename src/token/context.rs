//! Immutable signing material for one signer role.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
	Algorithm, DecodingKey, EncodingKey,
	jwk::{
		AlgorithmParameters, CommonParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse,
		RSAKeyParameters, RSAKeyType,
	},
};
use rand_core::OsRng;
use rsa::{RsaPrivateKey, pkcs1::EncodeRsaPrivateKey, traits::PublicKeyParts};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{KeyId, TokenSecret},
	error::{ConfigError, InternalError},
};

/// Modulus size used when none is configured.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Signing mode, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningMode {
	/// RSA-SHA256 with a published public key.
	Asymmetric,
	/// HMAC-SHA256 with a pre-shared secret; nothing is published.
	Symmetric,
}

/// Key material for a signer role.
///
/// Built once and never mutated, so a context can be shared across requests without locking.
/// Several contexts may coexist in one process, e.g. a broker and a few simulated telcos in a
/// test.
#[derive(Clone)]
pub struct SigningContext {
	mode: SigningMode,
	encoding: EncodingKey,
	decoding: DecodingKey,
	public_jwk: Option<Jwk>,
	key_id: Option<KeyId>,
}
impl SigningContext {
	/// Generates a fresh RSA key pair of `bits` bits.
	///
	/// The key id defaults to the RFC 7638 thumbprint of the public key.
	pub fn generate_rsa(key_id: Option<KeyId>, bits: usize) -> Result<Self, InternalError> {
		let private = RsaPrivateKey::new(&mut OsRng, bits).map_err(InternalError::key_generation)?;

		Self::from_rsa_key(&private, key_id)
	}

	/// Wraps an existing RSA private key.
	pub fn from_rsa_key(private: &RsaPrivateKey, key_id: Option<KeyId>) -> Result<Self, InternalError> {
		let der = private.to_pkcs1_der().map_err(InternalError::key_generation)?;
		let n = URL_SAFE_NO_PAD.encode(private.n().to_bytes_be());
		let e = URL_SAFE_NO_PAD.encode(private.e().to_bytes_be());
		let key_id = match key_id {
			Some(key_id) => key_id,
			None => KeyId::new(rsa_thumbprint(&n, &e)).map_err(InternalError::key_generation)?,
		};
		let decoding =
			DecodingKey::from_rsa_components(&n, &e).map_err(InternalError::key_generation)?;
		let public_jwk = Jwk {
			common: CommonParameters {
				public_key_use: Some(PublicKeyUse::Signature),
				key_algorithm: Some(KeyAlgorithm::RS256),
				key_id: Some(key_id.to_string()),
				..Default::default()
			},
			algorithm: AlgorithmParameters::RSA(RSAKeyParameters {
				key_type: RSAKeyType::RSA,
				n,
				e,
			}),
		};

		Ok(Self {
			mode: SigningMode::Asymmetric,
			encoding: EncodingKey::from_rsa_der(der.as_bytes()),
			decoding,
			public_jwk: Some(public_jwk),
			key_id: Some(key_id),
		})
	}

	/// HMAC-SHA256 context around a pre-shared secret.
	pub fn hmac(secret: &TokenSecret) -> Result<Self, ConfigError> {
		if secret.is_empty() {
			return Err(ConfigError::EmptySigningSecret);
		}

		let bytes = secret.expose().as_bytes();

		Ok(Self {
			mode: SigningMode::Symmetric,
			encoding: EncodingKey::from_secret(bytes),
			decoding: DecodingKey::from_secret(bytes),
			public_jwk: None,
			key_id: None,
		})
	}

	/// Mode chosen at construction.
	pub fn mode(&self) -> SigningMode {
		self.mode
	}

	/// JWS algorithm used for signing.
	pub fn algorithm(&self) -> Algorithm {
		match self.mode {
			SigningMode::Asymmetric => Algorithm::RS256,
			SigningMode::Symmetric => Algorithm::HS256,
		}
	}

	/// Key id written to token headers, asymmetric mode only.
	pub fn key_id(&self) -> Option<&KeyId> {
		self.key_id.as_ref()
	}

	/// Published key set: one entry in asymmetric mode, empty in symmetric mode.
	pub fn key_set(&self) -> JwkSet {
		JwkSet { keys: self.public_jwk.iter().cloned().collect() }
	}

	pub(crate) fn encoding_key(&self) -> &EncodingKey {
		&self.encoding
	}

	pub(crate) fn decoding_key(&self) -> &DecodingKey {
		&self.decoding
	}
}
impl Debug for SigningContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningContext")
			.field("mode", &self.mode)
			.field("key_id", &self.key_id)
			.finish_non_exhaustive()
	}
}

/// RFC 7638 thumbprint of an RSA public key given its base64url `n` and `e`.
pub fn rsa_thumbprint(n: &str, e: &str) -> String {
	// Required members only, in lexical order, no whitespace.
	let canonical = format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#);

	URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}
