// crates.io
use tracing::{Instrument, Span, field};
// self
use crate::{_prelude::*, auth::TenantId, obs::ExchangeStage};

/// Span wrapping one exchange from request parsing to response.
#[derive(Clone, Debug)]
pub struct ExchangeSpan {
	span: Span,
}
impl ExchangeSpan {
	/// Opens a span at [`ExchangeStage::Received`]; the tenant is filled in once routed.
	pub fn new() -> Self {
		let span = tracing::info_span!(
			"sim_broker.exchange",
			stage = ExchangeStage::Received.as_str(),
			tenant = field::Empty,
		);

		Self { span }
	}

	/// Records the stage just reached.
	pub fn record_stage(&self, stage: ExchangeStage) {
		self.span.record("stage", stage.as_str());
	}

	/// Records the tenant serving the exchange.
	pub fn record_tenant(&self, tenant: &TenantId) {
		self.span.record("tenant", &**tenant);
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> tracing::instrument::Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
impl Default for ExchangeSpan {
	fn default() -> Self {
		Self::new()
	}
}
