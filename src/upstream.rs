//! Resilient per-tenant upstream client.
//!
//! Every outbound telco call runs through the same wrapper: wait on the tenant's token-bucket
//! [`RateLimiter`], ask the tenant's [`CircuitBreaker`] for a permit (fast-failing while it is
//! open), then issue the HTTP request under a bounded deadline. Clients are long-lived and
//! shared through [`TelcoRegistry`], so breaker counters accumulate across requests.

pub mod breaker;
pub mod client;
pub mod rate_limit;
pub mod registry;

pub use breaker::*;
pub use client::*;
pub use rate_limit::*;
pub use registry::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Tuning knobs shared by every tenant's upstream client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamSettings {
	/// Steady-state request rate.
	pub requests_per_second: u32,
	/// Token-bucket burst capacity.
	pub burst: u32,
	/// Consecutive failures that open the breaker.
	pub failure_threshold: u32,
	/// Time the breaker stays open before allowing trial requests.
	pub open_cooldown: Duration,
	/// Trial requests admitted while half-open.
	pub half_open_trials: u32,
	/// Deadline covering both the limiter wait and the HTTP call.
	pub call_timeout: Duration,
}
impl UpstreamSettings {
	/// Rejects zero or negative settings.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let checks = [
			("requests_per_second", self.requests_per_second > 0),
			("burst", self.burst > 0),
			("failure_threshold", self.failure_threshold > 0),
			("open_cooldown", self.open_cooldown.is_positive()),
			("half_open_trials", self.half_open_trials > 0),
			("call_timeout", self.call_timeout.is_positive()),
		];

		match checks.into_iter().find(|(_, ok)| !ok) {
			Some((setting, _)) => Err(ConfigError::InvalidUpstreamSetting { setting }),
			None => Ok(()),
		}
	}
}
impl Default for UpstreamSettings {
	fn default() -> Self {
		Self {
			requests_per_second: 5,
			burst: 10,
			failure_threshold: 3,
			open_cooldown: Duration::seconds(30),
			half_open_trials: 1,
			call_timeout: Duration::seconds(5),
		}
	}
}
