//! TTL cache of key sets keyed by key-set URL.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{_prelude::*, clock::SharedClock};

/// Default lifetime of a cached key set.
pub const DEFAULT_KEY_SET_TTL: Duration = Duration::minutes(10);

/// Cached key set together with the instant it was fetched.
#[derive(Clone, Debug)]
pub struct KeySetCacheEntry {
	/// Cached document.
	pub key_set: JwkSet,
	/// Instant the document was written.
	pub fetched_at: OffsetDateTime,
	/// Cache-wide write sequence number of this entry.
	pub revision: u64,
}

/// Key-set cache guarded by a read/write lock.
///
/// Staleness is judged lazily on read (`age >= ttl`); nothing sweeps expired entries.
pub struct KeySetCache {
	entries: RwLock<HashMap<String, KeySetCacheEntry>>,
	ttl: Duration,
	clock: SharedClock,
	revision: AtomicU64,
}
impl KeySetCache {
	/// Creates an empty cache.
	pub fn new(ttl: Duration, clock: SharedClock) -> Self {
		Self { entries: Default::default(), ttl, clock, revision: AtomicU64::new(0) }
	}

	/// Returns a copy of the entry for `url` when it is younger than the TTL.
	pub fn get_fresh(&self, url: &Url) -> Option<JwkSet> {
		let now = self.clock.now();
		let entries = self.entries.read();
		let entry = entries.get(url.as_str())?;

		(now - entry.fetched_at < self.ttl).then(|| entry.key_set.clone())
	}

	/// Returns the raw entry for `url`, fresh or not.
	pub fn entry(&self, url: &Url) -> Option<KeySetCacheEntry> {
		self.entries.read().get(url.as_str()).cloned()
	}

	/// Revision of the most recent write. Every later write carries a higher one.
	pub fn revision(&self) -> u64 {
		self.revision.load(Ordering::Acquire)
	}

	/// Writes `key_set` for `url`, stamped with the current time.
	pub fn insert(&self, url: &Url, key_set: JwkSet) {
		let mut entries = self.entries.write();
		let entry = self.stamp(key_set);

		entries.insert(url.as_str().to_owned(), entry);
	}

	/// Writes `key_set` for `url` unless the entry was rewritten after `since`.
	///
	/// Returns `false` and keeps the newer entry when the write was skipped.
	pub fn insert_unless_newer(&self, url: &Url, key_set: JwkSet, since: u64) -> bool {
		let mut entries = self.entries.write();

		if entries.get(url.as_str()).is_some_and(|entry| entry.revision > since) {
			return false;
		}

		let entry = self.stamp(key_set);

		entries.insert(url.as_str().to_owned(), entry);

		true
	}

	// Callers hold the write lock, so revisions follow map order.
	fn stamp(&self, key_set: JwkSet) -> KeySetCacheEntry {
		let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;

		KeySetCacheEntry { key_set, fetched_at: self.clock.now(), revision }
	}

	/// Configured TTL.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}
}
impl Debug for KeySetCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeySetCache")
			.field("ttl", &self.ttl)
			.field("entries", &self.entries.read().len())
			.finish()
	}
}
