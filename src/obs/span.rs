// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// A span builder used around sequenced requests.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the provided stage + request identifier.
	pub fn new(stage: &'static str, request_id: u64) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("chat_relay.request", stage, request_id);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, request_id);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs that a throttled attempt is about to wait `delay` before retrying.
pub fn log_retry_wait(attempt: u32, delay: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Request throttled; backing off.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, delay);
	}
}

/// Logs a request that resolved with an error.
pub fn log_request_failure(stage: &'static str, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(stage, error = %error, "Request failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, error);
	}
}
