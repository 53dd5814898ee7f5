//! Broker role: routes phone numbers to telcos, verifies their tokens, and mints broker tokens.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use sim_broker::{
	clock::system_clock,
	config::BrokerConfig,
	exchange::TokenExchange,
	keys::{DEFAULT_KEY_SET_TTL, KeyResolver, KeySetCache},
	obs,
	server::{self, BrokerState, Readiness},
	token::{SigningContext, TokenEngine},
	upstream::TelcoRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_logging("sim-broker");

	let config = BrokerConfig::from_env()?;
	let clock = system_clock();
	let registry = TelcoRegistry::new(config.upstream)?.populate(&config.routing)?;
	let resolver = KeyResolver::new(KeySetCache::new(DEFAULT_KEY_SET_TTL, clock.clone()));
	let engine = TokenEngine::new(SigningContext::hmac(&config.signing_secret)?, clock);
	let exchange = TokenExchange::new(
		Arc::new(config.routing),
		Arc::new(registry),
		Arc::new(resolver),
		engine,
	)
	.with_issuer(config.issuer);
	let state = BrokerState::new(Arc::new(exchange)).with_error_details(config.expose_error_details);

	server::serve(config.listen_addr, server::broker_router(state), Readiness::new()).await?;

	Ok(())
}
