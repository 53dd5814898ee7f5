//! Coalescing key-set resolver.

// crates.io
use async_lock::OnceCell;
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{
	_prelude::*,
	error::UpstreamError,
	keys::{KeySetCache, KeySetFetcher},
};

type FlightResult = Result<JwkSet, UpstreamError>;
type Flight = Arc<OnceCell<FlightResult>>;

/// Resolves key sets through the cache, deduplicating concurrent fetches per URL.
///
/// All callers that miss the cache for the same URL while a fetch is in flight attach to that
/// fetch and observe the same key set or the same error. If the caller driving the fetch is
/// cancelled, one of the waiters takes the fetch over.
pub struct KeyResolver {
	cache: KeySetCache,
	flights: Mutex<HashMap<String, Flight>>,
}
impl KeyResolver {
	/// Creates a resolver around `cache`.
	pub fn new(cache: KeySetCache) -> Self {
		Self { cache, flights: Default::default() }
	}

	/// Underlying cache.
	pub fn cache(&self) -> &KeySetCache {
		&self.cache
	}

	/// Returns the key set for `url`, from cache when fresh, otherwise via a coalesced fetch.
	pub async fn resolve(&self, url: &Url, fetcher: &dyn KeySetFetcher) -> FlightResult {
		if let Some(key_set) = self.cache.get_fresh(url) {
			tracing::debug!(%url, "key set served from cache");

			return Ok(key_set);
		}

		let flight = self
			.flights
			.lock()
			.entry(url.as_str().to_owned())
			.or_insert_with(|| Arc::new(OnceCell::new()))
			.clone();
		let result = flight
			.get_or_init(|| async {
				// A flight that landed between our cache read and joining the map already
				// refreshed the entry.
				if let Some(key_set) = self.cache.get_fresh(url) {
					return Ok(key_set);
				}

				tracing::info!(%url, "fetching key set");

				let since = self.cache.revision();
				let result = fetcher.fetch_key_set(url).await;

				if let Ok(key_set) = &result {
					if !self.cache.insert_unless_newer(url, key_set.clone(), since) {
						tracing::debug!(%url, "newer key set landed during the fetch; keeping it");
					}
				}

				result
			})
			.await
			.clone();

		self.land(url, &flight);

		result
	}

	/// Fetches `url` unconditionally and overwrites the cache entry.
	///
	/// Bypasses both the cache and any in-flight fetch.
	pub async fn force_refresh(&self, url: &Url, fetcher: &dyn KeySetFetcher) -> FlightResult {
		tracing::info!(%url, "forcing key set refresh");

		let key_set = fetcher.fetch_key_set(url).await?;

		self.cache.insert(url, key_set.clone());

		Ok(key_set)
	}

	fn land(&self, url: &Url, flight: &Flight) {
		let mut flights = self.flights.lock();

		if flights.get(url.as_str()).is_some_and(|current| Arc::ptr_eq(current, flight)) {
			flights.remove(url.as_str());
		}
	}
}
impl Debug for KeyResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyResolver")
			.field("cache", &self.cache)
			.field("in_flight", &self.flights.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		clock::ManualClock,
		keys::{DEFAULT_KEY_SET_TTL, KeySetFuture},
	};

	struct StaticFetcher {
		key_set: JwkSet,
		delay: std::time::Duration,
	}
	impl KeySetFetcher for StaticFetcher {
		fn fetch_key_set<'a>(&'a self, _url: &'a Url) -> KeySetFuture<'a> {
			Box::pin(async move {
				tokio::time::sleep(self.delay).await;

				Ok(self.key_set.clone())
			})
		}
	}

	#[derive(Default)]
	struct CountingFetcher {
		calls: AtomicUsize,
		fail: bool,
	}
	impl KeySetFetcher for CountingFetcher {
		fn fetch_key_set<'a>(&'a self, _url: &'a Url) -> KeySetFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				tokio::time::sleep(std::time::Duration::from_millis(50)).await;

				if self.fail {
					Err(UpstreamError::Status { status: 503, body: "down".into() })
				} else {
					Ok(JwkSet { keys: Vec::new() })
				}
			})
		}
	}

	fn resolver() -> (KeyResolver, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());

		(KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, clock.clone())), clock)
	}

	fn url() -> Url {
		Url::parse("https://telco.example.com/.well-known/jwks.json")
			.expect("Key-set URL fixture should parse.")
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_fetch() {
		let (resolver, _clock) = resolver();
		let fetcher = CountingFetcher::default();
		let url = url();
		let (a, b, c) = tokio::join!(
			resolver.resolve(&url, &fetcher),
			resolver.resolve(&url, &fetcher),
			resolver.resolve(&url, &fetcher),
		);

		assert!(a.is_ok() && b.is_ok() && c.is_ok());
		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
		assert!(resolver.flights.lock().is_empty(), "Landed flights must be removed.");
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_error() {
		let (resolver, _clock) = resolver();
		let fetcher = CountingFetcher { fail: true, ..Default::default() };
		let url = url();
		let (a, b) =
			tokio::join!(resolver.resolve(&url, &fetcher), resolver.resolve(&url, &fetcher));

		assert_eq!(a, b);
		assert!(matches!(a, Err(UpstreamError::Status { status: 503, .. })));
		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
		assert!(resolver.cache().entry(&url).is_none(), "Errors must not be cached.");
	}

	#[tokio::test]
	async fn expired_entries_trigger_one_new_fetch() {
		let (resolver, clock) = resolver();
		let fetcher = CountingFetcher::default();
		let url = url();

		resolver.resolve(&url, &fetcher).await.expect("First resolution should fetch.");
		resolver.resolve(&url, &fetcher).await.expect("Second resolution should hit cache.");

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

		clock.advance(DEFAULT_KEY_SET_TTL);

		let (a, b) =
			tokio::join!(resolver.resolve(&url, &fetcher), resolver.resolve(&url, &fetcher));

		assert!(a.is_ok() && b.is_ok());
		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn force_refresh_always_fetches() {
		let (resolver, _clock) = resolver();
		let fetcher = CountingFetcher::default();
		let url = url();

		resolver.resolve(&url, &fetcher).await.expect("Resolution should fetch.");
		resolver.force_refresh(&url, &fetcher).await.expect("Forced refresh should fetch.");
		resolver.force_refresh(&url, &fetcher).await.expect("Forced refresh should fetch.");

		assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn slow_fetches_do_not_overwrite_a_forced_refresh() {
		let (resolver, _clock) = resolver();
		let url = url();
		let rotated: JwkSet = serde_json::from_str(
			r#"{"keys":[{"kty":"oct","kid":"cellcom-2","k":"cm90YXRlZC1zZWNyZXQ"}]}"#,
		)
		.expect("Key set fixture should parse.");
		let slow = StaticFetcher {
			key_set: JwkSet { keys: Vec::new() },
			delay: std::time::Duration::from_millis(200),
		};
		let fast = StaticFetcher { key_set: rotated.clone(), delay: std::time::Duration::ZERO };
		let (resolved, refreshed) = tokio::join!(resolver.resolve(&url, &slow), async {
			tokio::time::sleep(std::time::Duration::from_millis(50)).await;

			resolver.force_refresh(&url, &fast).await
		});

		assert!(resolved.is_ok());
		assert_eq!(refreshed, Ok(rotated.clone()));
		assert_eq!(resolver.cache().get_fresh(&url), Some(rotated));
	}
}
