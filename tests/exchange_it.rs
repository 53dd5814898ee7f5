// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use sim_broker::{
	auth::{ClientCredentials, KeyId, TokenSecret},
	clock::system_clock,
	error::{ClientError, Error, UpstreamError},
	exchange::{FORM_CONTENT_TYPE, TokenExchange},
	keys::{DEFAULT_KEY_SET_TTL, KeyResolver, KeySetCache},
	tenant::{KEY_SET_PATH, Prefix, RoutingTable, TOKEN_PATH, TelcoDescriptor},
	token::{Audience, AuthMethod, DEFAULT_RSA_BITS, SigningContext, TokenEngine},
	upstream::{TelcoRegistry, UpstreamSettings},
};

const CLIENT_ID: &str = "cellcom-client";
const CLIENT_SECRET: &str = "cellcom-secret";
const PHONE_BODY: &str =
	"grant_type=authorization_code&code=abc123&phone=%2B972050123456&code_verifier=verifier";

struct Harness {
	server: MockServer,
	telco: TokenEngine,
	exchange: TokenExchange,
}
impl Harness {
	async fn start() -> Self {
		let server = MockServer::start_async().await;
		let telco = TokenEngine::new(
			SigningContext::generate_rsa(
				Some(KeyId::new("cellcom-1").expect("Key id fixture should be valid.")),
				DEFAULT_RSA_BITS,
			)
			.expect("RSA key generation should succeed."),
			system_clock(),
		);
		let cellcom = TelcoDescriptor::new(
			Prefix::new("972050").expect("Prefix fixture should be valid."),
			Url::parse(&server.base_url()).expect("Mock server URL should parse."),
			CLIENT_ID,
			CLIENT_SECRET,
		)
		.expect("Descriptor fixture should be valid.");
		let other = TelcoDescriptor::new(
			Prefix::new("97205").expect("Prefix fixture should be valid."),
			Url::parse("http://127.0.0.1:9").expect("Fixture URL should parse."),
			"other-client",
			"other-secret",
		)
		.expect("Descriptor fixture should be valid.");
		let routing =
			Arc::new(RoutingTable::new([other, cellcom]).expect("Routing table should build."));
		let registry = Arc::new(
			TelcoRegistry::new(UpstreamSettings::default())
				.and_then(|registry| registry.populate(&routing))
				.expect("Registry should build."),
		);
		let resolver =
			Arc::new(KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock())));
		let broker = TokenEngine::new(
			SigningContext::hmac(&TokenSecret::new("broker-secret"))
				.expect("HMAC context should build."),
			system_clock(),
		);
		let exchange = TokenExchange::new(routing, registry, resolver, broker);

		Self { server, telco, exchange }
	}

	fn telco_token(&self, code: &str) -> String {
		self.telco
			.sign(&self.server.base_url(), code, Audience::single(CLIENT_ID), Duration::hours(1))
			.expect("Telco signing should succeed.")
	}

	async fn handle(&self, body: &str) -> Result<sim_broker::exchange::TokenResponse, Error> {
		self.exchange.handle("POST", Some(FORM_CONTENT_TYPE), body.as_bytes()).await
	}
}

#[tokio::test]
async fn sim_exchange_mints_a_broker_token() {
	let harness = Harness::start().await;
	let basic = ClientCredentials::new(CLIENT_ID, CLIENT_SECRET).to_basic_header();
	let telco_token = harness.telco_token("abc123");
	let token_mock = harness
		.server
		.mock_async(|when, then| {
			when.method(POST)
				.path(format!("/{TOKEN_PATH}"))
				.header("authorization", basic.as_str())
				.body_includes("code=abc123");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!(
					"{{\"access_token\":\"{telco_token}\",\"token_type\":\"Bearer\",\"expires_in\":3600}}"
				));
		})
		.await;
	let key_set_mock = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(
				serde_json::to_string(&harness.telco.key_set()).expect("Key set should serialize."),
			);
		})
		.await;
	let response = harness.handle(PHONE_BODY).await.expect("Exchange should succeed.");

	assert_eq!(response.token_type, "bearer");
	assert_eq!(response.expires_in, 900);

	let claims = harness
		.exchange
		.engine()
		.verify_issued(&response.access_token)
		.expect("The broker should accept its own token.");

	assert_eq!(claims.issuer, "sim-broker");
	assert_eq!(claims.subject, "abc123");
	assert!(claims.audience.contains(CLIENT_ID));
	assert_eq!(claims.extra.auth_method, Some(AuthMethod::Sim));

	token_mock.assert_calls_async(1).await;
	key_set_mock.assert_calls_async(1).await;

	// A second exchange reuses the cached key set.
	harness.handle(PHONE_BODY).await.expect("Second exchange should succeed.");

	token_mock.assert_calls_async(2).await;
	key_set_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn upstream_failures_surface_as_bad_gateway() {
	let harness = Harness::start().await;
	let _mock = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path(format!("/{TOKEN_PATH}"));
			then.status(500).body("database on fire");
		})
		.await;
	let err = harness.handle(PHONE_BODY).await.expect_err("A 500 from the telco must fail.");

	assert!(matches!(err, Error::Upstream(UpstreamError::Status { status: 500, .. })));
	assert_eq!(err.status(), 502);
	assert!(!err.redacted_description().contains("database"));
}

#[tokio::test]
async fn unknown_prefixes_are_rejected_without_upstream_calls() {
	let harness = Harness::start().await;
	let mock = harness
		.server
		.mock_async(|when, then| {
			when.path(format!("/{TOKEN_PATH}"));
			then.status(200);
		})
		.await;
	let err = harness
		.handle("grant_type=authorization_code&code=abc123&phone=%2B14155550100")
		.await
		.expect_err("Numbers outside every prefix must be rejected.");

	assert!(matches!(err, Error::Client(ClientError::NoRouteFound { .. })));
	assert_eq!(err.status(), 400);

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn tokens_signed_for_another_key_fail_verification() {
	let harness = Harness::start().await;
	let rogue = TokenEngine::new(
		SigningContext::generate_rsa(None, DEFAULT_RSA_BITS)
			.expect("RSA key generation should succeed."),
		system_clock(),
	);
	let rogue_token = rogue
		.sign("http://rogue", "abc123", Audience::single(CLIENT_ID), Duration::hours(1))
		.expect("Rogue signing should succeed.");
	let _token_mock = harness
		.server
		.mock_async(|when, then| {
			when.method(POST).path(format!("/{TOKEN_PATH}"));
			then.status(200).body(format!("{{\"access_token\":\"{rogue_token}\"}}"));
		})
		.await;
	let key_set_mock = harness
		.server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{KEY_SET_PATH}"));
			then.status(200).body(
				serde_json::to_string(&harness.telco.key_set()).expect("Key set should serialize."),
			);
		})
		.await;
	let err = harness.handle(PHONE_BODY).await.expect_err("Unknown signing keys must be rejected.");

	assert_eq!(err.status(), 502);
	assert_eq!(err.code(), "invalid_upstream_token");

	key_set_mock.assert_calls_async(2).await;
}
