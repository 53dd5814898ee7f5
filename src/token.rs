//! Token claims, signing material, and the signing/verification engine.
//!
//! A [`SigningContext`] is built once per signer role: asymmetric (RSA-SHA256, public key
//! exposed as a one-entry key set) for telcos, symmetric (HMAC-SHA256, nothing exposed) for the
//! broker. [`TokenEngine`] wraps a context with a clock and provides `sign`, `mint`, and the
//! rotation-aware `verify` used at the trust boundary.

pub mod claims;
pub mod context;
pub mod engine;

pub use claims::*;
pub use context::*;
pub use engine::*;
