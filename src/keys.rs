//! Verification key sets: TTL cache, coalesced resolution, and rotation-aware refresh.
//!
//! [`KeyResolver::resolve`] serves fresh cache entries without touching the network and
//! collapses concurrent misses for the same URL into one upstream fetch.
//! [`KeyResolver::force_refresh`] bypasses both and is reserved for the verification path when
//! no cached key validates a token.

pub mod cache;
pub mod resolver;

pub use cache::*;
pub use resolver::*;

// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{_prelude::*, error::UpstreamError};

/// Boxed future returned by [`KeySetFetcher::fetch_key_set`].
pub type KeySetFuture<'a> = Pin<Box<dyn Future<Output = Result<JwkSet, UpstreamError>> + 'a + Send>>;

/// Source of key-set documents, usually a tenant's resilient upstream client.
pub trait KeySetFetcher
where
	Self: Send + Sync,
{
	/// Downloads the key set published at `url`.
	fn fetch_key_set<'a>(&'a self, url: &'a Url) -> KeySetFuture<'a>;
}
