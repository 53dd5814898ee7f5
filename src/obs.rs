//! Observability helpers for the exchange pipeline.
//!
//! - Every exchange runs inside a `sim_broker.exchange` span carrying the `stage` reached and,
//!   once routed, the `tenant`.
//! - Enable `metrics` to increment the `sim_broker_exchange_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.
//! - [`init_logging`] installs the JSON log subscriber used by both binaries.

mod logging;
mod metrics;
mod tracing;

pub use logging::*;
pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Stages of the per-request exchange state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeStage {
	/// Raw request accepted for processing.
	Received,
	/// Method, content type, grant type, and phone number checked.
	Validated,
	/// Phone number mapped to a telco.
	Routed,
	/// Authorization code traded for the telco token.
	Exchanged,
	/// Telco token signature and claims verified.
	Verified,
	/// Broker token minted.
	Minted,
}
impl ExchangeStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeStage::Received => "received",
			ExchangeStage::Validated => "validated",
			ExchangeStage::Routed => "routed",
			ExchangeStage::Exchanged => "exchanged",
			ExchangeStage::Verified => "verified",
			ExchangeStage::Minted => "minted",
		}
	}
}
impl Display for ExchangeStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeOutcome {
	/// Exchange started.
	Attempt,
	/// Broker token issued.
	Success,
	/// Exchange short-circuited with an error.
	Failure,
}
impl ExchangeOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeOutcome::Attempt => "attempt",
			ExchangeOutcome::Success => "success",
			ExchangeOutcome::Failure => "failure",
		}
	}
}
impl Display for ExchangeOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
