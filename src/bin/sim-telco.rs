//! Telco role: publishes an RSA key set and issues tokens to the broker.
//!
//! Usage: `sim-telco <PREFIX>`, where `<PREFIX>` selects the `<PREFIX>_KEY_ID`,
//! `<PREFIX>_CLIENT_ID`, `<PREFIX>_CLIENT_SECRET`, and `<PREFIX>_ISSUER_URL` variables.

// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use sim_broker::{
	auth::ClientCredentials,
	clock::system_clock,
	config::TelcoConfig,
	obs,
	server::{self, Readiness, TelcoState},
	token::{SigningContext, TokenEngine},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let prefix = std::env::args().nth(1).ok_or_else(|| eyre!("usage: sim-telco <PREFIX>"))?;

	obs::init_logging(&format!("sim-telco-{}", prefix.to_ascii_lowercase()));

	let config = TelcoConfig::from_env(&prefix)?;
	let context = SigningContext::generate_rsa(Some(config.key_id), config.rsa_bits)?;
	let engine = TokenEngine::new(context, system_clock());
	let state = TelcoState::new(
		engine,
		ClientCredentials::new(config.client_id, config.client_secret),
		config.issuer,
	);

	server::serve(config.listen_addr, server::telco_router(state), Readiness::new()).await?;

	Ok(())
}
