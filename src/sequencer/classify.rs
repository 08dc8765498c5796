//! Failure classification used by the retry policy.

/// Lower-cased markers that identify a throttling failure inside an error message.
pub const THROTTLING_MARKERS: [&str; 5] =
	["429", "too many requests", "resource exhausted", "resource_exhausted", "rate limit"];

/// How the retry policy should treat a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
	/// Upstream is rate limiting; the attempt may be retried after a backoff.
	Throttling,
	/// Any other failure; surfaced to the caller without retrying.
	Terminal,
}
impl FailureClass {
	/// Returns `true` for [`FailureClass::Throttling`].
	pub const fn is_throttling(self) -> bool {
		matches!(self, Self::Throttling)
	}
}

/// Errors that can tell the sequencer whether they are worth retrying.
pub trait Classify {
	/// Classifies this failure.
	fn classify(&self) -> FailureClass;
}

/// Classifies a free-form error message by looking for [`THROTTLING_MARKERS`].
pub fn classify_message(message: &str) -> FailureClass {
	let lowered = message.to_lowercase();

	if THROTTLING_MARKERS.iter().any(|marker| lowered.contains(marker)) {
		FailureClass::Throttling
	} else {
		FailureClass::Terminal
	}
}
