//! Token-bucket rate limiting for outbound telco calls.

// std
use std::num::NonZeroU32;
// crates.io
use governor::{DefaultDirectRateLimiter, Quota};
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::TenantId,
	error::{ConfigError, UpstreamError},
	upstream::UpstreamSettings,
};

/// Per-tenant token bucket refilled at a steady rate with a burst allowance.
pub struct RateLimiter {
	tenant: TenantId,
	inner: DefaultDirectRateLimiter,
}
impl RateLimiter {
	/// Builds a limiter from the shared upstream settings.
	pub fn new(tenant: TenantId, settings: &UpstreamSettings) -> Result<Self, ConfigError> {
		let rate = NonZeroU32::new(settings.requests_per_second)
			.ok_or(ConfigError::InvalidUpstreamSetting { setting: "requests_per_second" })?;
		let burst = NonZeroU32::new(settings.burst)
			.ok_or(ConfigError::InvalidUpstreamSetting { setting: "burst" })?;
		let quota = Quota::per_second(rate).allow_burst(burst);

		Ok(Self { tenant, inner: governor::RateLimiter::direct(quota) })
	}

	/// Waits for a permit, giving up once `deadline` passes.
	///
	/// Dropping the returned future abandons the wait without consuming a permit.
	pub async fn acquire(&self, deadline: Instant) -> Result<(), UpstreamError> {
		tokio::time::timeout_at(deadline, self.inner.until_ready()).await.map_err(|_| {
			tracing::warn!(tenant = %self.tenant, "rate limiter wait exceeded the call deadline");

			UpstreamError::RateLimited { tenant: self.tenant.to_string() }
		})
	}

	/// Takes a permit only if one is available right now.
	pub fn try_acquire(&self) -> bool {
		self.inner.check().is_ok()
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("tenant", &self.tenant).finish()
	}
}
