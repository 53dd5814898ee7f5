// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use jsonwebtoken::jwk::JwkSet;
use time::Duration;
use url::Url;
// self
use sim_broker::{
	auth::{KeyId, TokenSecret},
	clock::{ManualClock, SharedClock, system_clock},
	error::{Error, TrustError},
	keys::{DEFAULT_KEY_SET_TTL, KeyResolver, KeySetCache},
	tenant::{KEY_SET_PATH, Prefix, TelcoDescriptor},
	token::{Audience, DEFAULT_RSA_BITS, SigningContext, TokenEngine},
	upstream::{TelcoClient, TelcoRegistry, UpstreamSettings},
};

const CLIENT_ID: &str = "cellcom-client";
const ISSUER: &str = "http://cellcom.test";

fn telco_engine(key_id: &str, clock: SharedClock) -> TokenEngine {
	let key_id = KeyId::new(key_id).expect("Key id fixture should be valid.");
	let context = SigningContext::generate_rsa(Some(key_id), DEFAULT_RSA_BITS)
		.expect("RSA key generation should succeed.");

	TokenEngine::new(context, clock)
}

fn broker_engine() -> TokenEngine {
	let context = SigningContext::hmac(&TokenSecret::new("broker-secret"))
		.expect("HMAC context should build.");

	TokenEngine::new(context, system_clock())
}

fn build_client(server: &MockServer) -> Arc<TelcoClient> {
	let descriptor = TelcoDescriptor::new(
		Prefix::new("972050").expect("Prefix fixture should be valid."),
		Url::parse(&server.base_url()).expect("Mock server URL should parse."),
		CLIENT_ID,
		"cellcom-secret",
	)
	.expect("Descriptor fixture should be valid.");

	TelcoRegistry::new(UpstreamSettings::default())
		.expect("Registry should build.")
		.client_for(&Arc::new(descriptor))
		.expect("Client should be registered.")
}

fn key_set_body(key_set: &JwkSet) -> String {
	serde_json::to_string(key_set).expect("Key set should serialize.")
}

fn sign(engine: &TokenEngine) -> String {
	engine
		.sign(ISSUER, "abc123", Audience::single(CLIENT_ID), Duration::hours(1))
		.expect("Telco signing should succeed.")
}

#[tokio::test]
async fn concurrent_resolutions_share_one_fetch() {
	let telco = telco_engine("cellcom-1", system_clock());
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200)
				.delay(std::time::Duration::from_millis(200))
				.body(key_set_body(&telco.key_set()));
		})
		.await;
	let client = build_client(&server);
	let resolver = Arc::new(KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock())));
	let url = client.descriptor().key_set_endpoint();
	let handles = (0..8)
		.map(|_| {
			let (resolver, client, url) = (resolver.clone(), client.clone(), url.clone());

			tokio::spawn(async move { resolver.resolve(&url, client.as_ref()).await })
		})
		.collect::<Vec<_>>();
	let mut results = Vec::new();

	for handle in handles {
		results.push(
			handle.await.expect("Resolver task should not panic.").expect("Resolution should succeed."),
		);
	}

	assert!(results.iter().all(|key_set| key_set == &telco.key_set()));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn stale_entries_are_refetched_once_after_the_ttl() {
	let telco = telco_engine("cellcom-1", system_clock());
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(key_set_body(&telco.key_set()));
		})
		.await;
	let client = build_client(&server);
	let clock = Arc::new(ManualClock::default());
	let resolver = KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, clock.clone()));
	let url = client.descriptor().key_set_endpoint();

	resolver.resolve(&url, client.as_ref()).await.expect("First resolution should fetch.");
	clock.advance(Duration::minutes(9));
	resolver.resolve(&url, client.as_ref()).await.expect("Fresh entry should be served.");

	mock.assert_calls_async(1).await;

	clock.advance(Duration::minutes(1));
	resolver.resolve(&url, client.as_ref()).await.expect("Stale entry should be refetched.");
	resolver.resolve(&url, client.as_ref()).await.expect("Refetched entry should be served.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn rotated_keys_verify_after_one_forced_refresh() {
	let old = telco_engine("cellcom-1", system_clock());
	let new = telco_engine("cellcom-2", system_clock());
	let server = MockServer::start_async().await;
	let mut old_set = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(key_set_body(&old.key_set()));
		})
		.await;
	let client = build_client(&server);
	let resolver = KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock()));
	let url = client.descriptor().key_set_endpoint();

	resolver.resolve(&url, client.as_ref()).await.expect("Cache warm-up should succeed.");
	old_set.assert_calls_async(1).await;
	old_set.delete_async().await;

	let new_set = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(key_set_body(&new.key_set()));
		})
		.await;
	let broker = broker_engine();
	let token = sign(&new);
	let claims = broker
		.verify(&token, &url, &resolver, client.as_ref())
		.await
		.expect("A token signed with the rotated key should verify after a refresh.");

	assert_eq!(claims.subject, "abc123");
	assert_eq!(claims.issuer, ISSUER);
	assert!(claims.audience.contains(CLIENT_ID));

	new_set.assert_calls_async(1).await;

	broker
		.verify(&token, &url, &resolver, client.as_ref())
		.await
		.expect("The refreshed cache should now hold the rotated key.");

	new_set.assert_calls_async(1).await;
}

#[tokio::test]
async fn unknown_keys_fail_terminally_after_one_refresh() {
	let published = telco_engine("cellcom-1", system_clock());
	let rogue = telco_engine("cellcom-1", system_clock());
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(key_set_body(&published.key_set()));
		})
		.await;
	let client = build_client(&server);
	let resolver = KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock()));
	let url = client.descriptor().key_set_endpoint();
	let err = broker_engine()
		.verify(&sign(&rogue), &url, &resolver, client.as_ref())
		.await
		.expect_err("A token signed by an unpublished key must be rejected.");

	assert!(matches!(err, Error::Trust(TrustError::NoMatchingKey)));
	assert_eq!(err.status(), 502);

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn non_rsa_tokens_are_rejected_before_any_fetch() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body("{\"keys\":[]}");
		})
		.await;
	let client = build_client(&server);
	let resolver = KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock()));
	let url = client.descriptor().key_set_endpoint();
	let broker = broker_engine();
	let hs256 = broker
		.sign("sim-broker", "abc123", Audience::single(CLIENT_ID), Duration::minutes(5))
		.expect("HMAC signing should succeed.");
	let err = broker
		.verify(&hs256, &url, &resolver, client.as_ref())
		.await
		.expect_err("HS256 tokens must not be accepted from a telco.");

	assert!(matches!(err, Error::Trust(TrustError::UnsupportedAlgorithm { .. })));

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn expired_telco_tokens_are_rejected() {
	let clock = Arc::new(ManualClock::default());
	let telco = telco_engine("cellcom-1", clock.clone());
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(key_set_body(&telco.key_set()));
		})
		.await;

	clock.advance(-Duration::hours(3));

	let token = sign(&telco);
	let client = build_client(&server);
	let resolver = KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock()));
	let err = broker_engine()
		.verify(&token, &client.descriptor().key_set_endpoint(), &resolver, client.as_ref())
		.await
		.expect_err("A token that expired two hours ago must be rejected.");

	assert!(matches!(err, Error::Trust(TrustError::InvalidClaims { .. })));
}
