// std
use std::sync::Arc;
// crates.io
use axum::{
	Router,
	body::{Body, to_bytes},
	http::{
		Request, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
	},
	response::Response,
};
use tower::ServiceExt;
// self
use sim_broker::{
	auth::{ClientCredentials, TokenSecret},
	clock::system_clock,
	exchange::{FORM_CONTENT_TYPE, TokenExchange, TokenResponse},
	keys::{DEFAULT_KEY_SET_TTL, KeyResolver, KeySetCache},
	server::{
		BrokerState, ErrorBody, Readiness, TELCO_REALM, TelcoState, broker_router, health_router,
		telco_router,
	},
	tenant::RoutingTable,
	token::{DEFAULT_RSA_BITS, SigningContext, TokenEngine},
	upstream::{TelcoRegistry, UpstreamSettings},
};

const CLIENT_ID: &str = "cellcom-client";
const CLIENT_SECRET: &str = "cellcom-secret";

fn broker_app() -> Router {
	let routing = Arc::new(RoutingTable::default());
	let registry = Arc::new(
		TelcoRegistry::new(UpstreamSettings::default()).expect("Registry should build."),
	);
	let resolver =
		Arc::new(KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, system_clock())));
	let engine = TokenEngine::new(
		SigningContext::hmac(&TokenSecret::new("broker-secret")).expect("HMAC context should build."),
		system_clock(),
	);

	broker_router(BrokerState::new(Arc::new(TokenExchange::new(routing, registry, resolver, engine))))
}

fn telco_engine() -> TokenEngine {
	TokenEngine::new(
		SigningContext::generate_rsa(None, DEFAULT_RSA_BITS)
			.expect("RSA key generation should succeed."),
		system_clock(),
	)
}

fn telco_app(engine: TokenEngine) -> Router {
	telco_router(TelcoState::new(
		engine,
		ClientCredentials::new(CLIENT_ID, CLIENT_SECRET),
		"http://cellcom.test",
	))
}

async fn send(app: Router, request: Request<Body>) -> Response {
	app.oneshot(request).await.expect("Router should be infallible.")
}

async fn body_bytes(response: Response) -> Vec<u8> {
	to_bytes(response.into_body(), usize::MAX).await.expect("Body should be readable.").to_vec()
}

async fn error_body(response: Response) -> ErrorBody {
	serde_json::from_slice(&body_bytes(response).await).expect("Error body should be JSON.")
}

fn form_post(uri: &str, body: &'static str) -> Request<Body> {
	Request::post(uri)
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.body(Body::from(body))
		.expect("Request should build.")
}

#[tokio::test]
async fn broker_rejects_non_post_methods() {
	let response = send(
		broker_app(),
		Request::get("/token").body(Body::empty()).expect("Request should build."),
	)
	.await;

	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
	assert_eq!(error_body(response).await.error, "method_not_allowed");
}

#[tokio::test]
async fn broker_rejects_json_bodies() {
	let response = send(
		broker_app(),
		Request::post("/token")
			.header(CONTENT_TYPE, "application/json")
			.body(Body::from("{}"))
			.expect("Request should build."),
	)
	.await;

	assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
	assert_eq!(error_body(response).await.error, "unsupported_media_type");
}

#[tokio::test]
async fn broker_rejects_unknown_grant_types() {
	let response = send(
		broker_app(),
		form_post("/token", "grant_type=client_credentials&code=abc&phone=%2B972050123456"),
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(error_body(response).await.error, "unsupported_grant_type");
}

#[tokio::test]
async fn broker_reports_unrouted_numbers() {
	let response = send(
		broker_app(),
		form_post("/token", "grant_type=authorization_code&code=abc&phone=%2B972050123456"),
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(error_body(response).await.error, "unknown_phone_prefix");
}

#[tokio::test]
async fn telco_publishes_its_key_set() {
	let engine = telco_engine();
	let response = send(
		telco_app(engine.clone()),
		Request::get("/.well-known/jwks.json").body(Body::empty()).expect("Request should build."),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);

	let key_set = serde_json::from_slice::<jsonwebtoken::jwk::JwkSet>(&body_bytes(response).await)
		.expect("Key set should be JSON.");

	assert_eq!(key_set, engine.key_set());
	assert_eq!(key_set.keys.len(), 1);
}

#[tokio::test]
async fn telco_challenges_wrong_credentials() {
	let response = send(
		telco_app(telco_engine()),
		Request::post("/token")
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(AUTHORIZATION, ClientCredentials::new(CLIENT_ID, "wrong").to_basic_header())
			.body(Body::from("grant_type=authorization_code&code=abc123"))
			.expect("Request should build."),
	)
	.await;

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(
		response.headers().get(WWW_AUTHENTICATE).and_then(|value| value.to_str().ok()),
		Some(TELCO_REALM)
	);
	assert_eq!(error_body(response).await.error, "invalid_client");
}

#[tokio::test]
async fn telco_issues_tokens_for_basic_auth_clients() {
	let engine = telco_engine();
	let response = send(
		telco_app(engine.clone()),
		Request::post("/token")
			.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
			.header(AUTHORIZATION, ClientCredentials::new(CLIENT_ID, CLIENT_SECRET).to_basic_header())
			.body(Body::from("grant_type=authorization_code&code=abc123"))
			.expect("Request should build."),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);

	let token = serde_json::from_slice::<TokenResponse>(&body_bytes(response).await)
		.expect("Token response should be JSON.");

	assert_eq!(token.token_type, "Bearer");
	assert_eq!(token.expires_in, 3_600);

	let claims = engine.verify_issued(&token.access_token).expect("Telco token should verify.");

	assert_eq!(claims.issuer, "http://cellcom.test");
	assert_eq!(claims.subject, "abc123");
	assert!(claims.audience.contains(CLIENT_ID));
}

#[tokio::test]
async fn telco_accepts_form_credentials() {
	let response = send(
		telco_app(telco_engine()),
		form_post(
			"/token",
			"grant_type=authorization_code&code=abc123&client_id=cellcom-client&client_secret=cellcom-secret",
		),
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readiness_flips_on_shutdown() {
	let readiness = Readiness::new();
	let app = health_router(readiness.clone());
	let healthz = send(
		app.clone(),
		Request::get("/healthz").body(Body::empty()).expect("Request should build."),
	)
	.await;

	assert_eq!(healthz.status(), StatusCode::OK);
	assert_eq!(body_bytes(healthz).await, b"OK");

	let ready = send(
		app.clone(),
		Request::get("/readyz").body(Body::empty()).expect("Request should build."),
	)
	.await;

	assert_eq!(ready.status(), StatusCode::OK);

	readiness.set_ready(false);

	let draining =
		send(app, Request::get("/readyz").body(Body::empty()).expect("Request should build.")).await;

	assert_eq!(draining.status(), StatusCode::SERVICE_UNAVAILABLE);
}
