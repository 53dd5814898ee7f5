//! Consecutive-failure circuit breaker with a single-trial half-open state.
//!
//! The breaker starts [`BreakerState::Closed`]. After `failure_threshold` consecutive failures
//! it opens and rejects every call without touching the network. Once `open_cooldown` has
//! elapsed (judged lazily on the next call) it becomes half-open and admits up to
//! `half_open_trials` calls; a successful trial closes it, a failed one re-opens it.
//!
//! Every transition bumps a generation counter. Permits remember the generation they were
//! issued in, so a slow call that finishes after the breaker already moved on cannot flip
//! the state a second time.
//!
//! A permit dropped without a verdict (the caller gave up) records nothing. A cancelled
//! half-open trial only hands its slot back.

// self
use crate::{
	_prelude::*,
	auth::TenantId,
	clock::SharedClock,
	error::UpstreamError,
	upstream::UpstreamSettings,
};

/// Observable breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BreakerState {
	/// Calls flow normally.
	Closed,
	/// Calls fail fast until the cooldown elapses.
	Open,
	/// A limited number of trial calls decide whether to close again.
	HalfOpen,
}
impl BreakerState {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "closed",
			Self::Open => "open",
			Self::HalfOpen => "half_open",
		}
	}
}
impl Display for BreakerState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[derive(Debug)]
struct BreakerInner {
	state: BreakerState,
	generation: u64,
	consecutive_failures: u32,
	opened_at: OffsetDateTime,
	trials_in_flight: u32,
}

/// Per-tenant circuit breaker.
pub struct CircuitBreaker {
	tenant: TenantId,
	failure_threshold: u32,
	open_cooldown: Duration,
	half_open_trials: u32,
	clock: SharedClock,
	inner: Mutex<BreakerInner>,
}
impl CircuitBreaker {
	/// Creates a closed breaker.
	pub fn new(tenant: TenantId, settings: &UpstreamSettings, clock: SharedClock) -> Self {
		let opened_at = clock.now();

		Self {
			tenant,
			failure_threshold: settings.failure_threshold,
			open_cooldown: settings.open_cooldown,
			half_open_trials: settings.half_open_trials,
			clock,
			inner: Mutex::new(BreakerInner {
				state: BreakerState::Closed,
				generation: 0,
				consecutive_failures: 0,
				opened_at,
				trials_in_flight: 0,
			}),
		}
	}

	/// Current state, applying an elapsed cooldown first.
	pub fn state(&self) -> BreakerState {
		let mut inner = self.inner.lock();

		self.refresh(&mut inner);

		inner.state
	}

	/// Consecutive failures recorded since the last success or transition.
	pub fn consecutive_failures(&self) -> u32 {
		self.inner.lock().consecutive_failures
	}

	/// Asks for permission to call the upstream.
	///
	/// Fails with [`UpstreamError::CircuitOpen`] while open, and while half-open once every
	/// trial slot is taken.
	pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, UpstreamError> {
		let mut inner = self.inner.lock();

		self.refresh(&mut inner);

		match inner.state {
			BreakerState::Closed => {},
			BreakerState::Open => return Err(self.rejection()),
			BreakerState::HalfOpen => {
				if inner.trials_in_flight >= self.half_open_trials {
					return Err(self.rejection());
				}

				inner.trials_in_flight += 1;
			},
		}

		Ok(BreakerPermit { breaker: self, generation: inner.generation, settled: false })
	}

	fn rejection(&self) -> UpstreamError {
		UpstreamError::CircuitOpen { tenant: self.tenant.to_string() }
	}

	fn refresh(&self, inner: &mut BreakerInner) {
		if inner.state == BreakerState::Open
			&& self.clock.now() - inner.opened_at >= self.open_cooldown
		{
			self.transition(inner, BreakerState::HalfOpen);
		}
	}

	fn transition(&self, inner: &mut BreakerInner, to: BreakerState) {
		let from = inner.state;

		inner.state = to;
		inner.generation += 1;
		inner.consecutive_failures = 0;
		inner.trials_in_flight = 0;

		if to == BreakerState::Open {
			inner.opened_at = self.clock.now();

			tracing::warn!(tenant = %self.tenant, %from, %to, "circuit breaker opened");
		} else {
			tracing::info!(tenant = %self.tenant, %from, %to, "circuit breaker state changed");
		}
	}

	fn settle(&self, generation: u64, success: bool) {
		let mut inner = self.inner.lock();

		self.refresh(&mut inner);

		if inner.generation != generation {
			return;
		}

		match (inner.state, success) {
			(BreakerState::Closed, true) => inner.consecutive_failures = 0,
			(BreakerState::Closed, false) => {
				inner.consecutive_failures += 1;

				if inner.consecutive_failures >= self.failure_threshold {
					self.transition(&mut inner, BreakerState::Open);
				}
			},
			(BreakerState::HalfOpen, true) => self.transition(&mut inner, BreakerState::Closed),
			(BreakerState::HalfOpen, false) => self.transition(&mut inner, BreakerState::Open),
			(BreakerState::Open, _) => {},
		}
	}

	fn release(&self, generation: u64) {
		let mut inner = self.inner.lock();

		if inner.generation == generation && inner.state == BreakerState::HalfOpen {
			inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);

			tracing::debug!(tenant = %self.tenant, "cancelled trial released its slot");
		}
	}
}
impl Debug for CircuitBreaker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CircuitBreaker")
			.field("tenant", &self.tenant)
			.field("state", &self.inner.lock().state)
			.finish()
	}
}

/// Admission ticket returned by [`CircuitBreaker::try_acquire`].
///
/// Dropping an unsettled permit, as a cancelled call does, records no outcome.
#[must_use = "settle the permit with `success` or `failure`"]
pub struct BreakerPermit<'a> {
	breaker: &'a CircuitBreaker,
	generation: u64,
	settled: bool,
}
impl BreakerPermit<'_> {
	/// Records a successful call.
	pub fn success(mut self) {
		self.settled = true;
		self.breaker.settle(self.generation, true);
	}

	/// Records a failed call.
	pub fn failure(mut self) {
		self.settled = true;
		self.breaker.settle(self.generation, false);
	}

	/// Gives the permit back without recording an outcome.
	pub fn cancel(self) {}
}
impl Drop for BreakerPermit<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.breaker.release(self.generation);
		}
	}
}
impl Debug for BreakerPermit<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BreakerPermit").field("generation", &self.generation).finish()
	}
}
