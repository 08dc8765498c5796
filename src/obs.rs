//! Optional observability helpers for sequenced requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `chat_relay.request` with the `stage` and
//!   `request_id` fields, plus a warning event for every retry wait.
//! - Enable `metrics` to increment the `chat_relay_request_total` counter for every
//!   attempt/throttle/success/failure/exhaustion, labeled by `outcome`.

mod counter;
mod span;

pub use counter::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for sequenced requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// An attempt is about to call the operation.
	Attempt,
	/// An attempt failed with a throttling error.
	Throttled,
	/// The request resolved successfully.
	Success,
	/// The request failed with a terminal error.
	Failure,
	/// The request ran out of throttling retries.
	Exhausted,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Throttled => "throttled",
			RequestOutcome::Success => "success",
			RequestOutcome::Failure => "failure",
			RequestOutcome::Exhausted => "exhausted",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
