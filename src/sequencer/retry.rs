//! Throttling-aware retry policy with doubling backoff.
//!
//! [`RetryPolicy::run`] invokes an operation until it succeeds, fails with a
//! [`FailureClass::Terminal`] error, or exhausts `max_attempts` throttled attempts. The wait
//! before attempt `k + 1` is `initial_backoff * 2^(k - 1)`, so the default policy sleeps 1 s and
//! then 2 s between its three attempts.

// self
use crate::{
	_prelude::*,
	notify::{Notification, NotificationSink},
	obs::{self, RequestOutcome},
	sequencer::{Classify, FailureClass, SequencerError},
};

/// Per-operation retry configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Total attempts allowed for a throttled operation, including the first one.
	pub max_attempts: u32,
	/// Wait applied after the first throttled attempt; doubles after every retry.
	pub initial_backoff: Duration,
}
impl RetryPolicy {
	/// Attempts allowed by [`RetryPolicy::default`].
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Initial wait used by [`RetryPolicy::default`].
	pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

	/// Backoff scheduled after the throttled `attempt` (1-based): `initial * 2^(attempt - 1)`.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(31);

		self.initial_backoff.saturating_mul(1_u32 << exponent)
	}

	/// Runs `operation` under this policy and reports each retry wait to `sink`.
	pub async fn run<T, E, F, Fut>(
		&self,
		operation: F,
		sink: &dyn NotificationSink,
	) -> Result<T, SequencerError<E>>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Classify,
	{
		self.run_observed(operation, |_, delay| sink.notify(Notification::retrying(delay))).await
	}

	pub(crate) async fn run_observed<T, E, F, Fut, O>(
		&self,
		mut operation: F,
		mut on_retry: O,
	) -> Result<T, SequencerError<E>>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
		E: Classify,
		O: FnMut(u32, Duration),
	{
		let mut state = BackoffState::new(self);

		loop {
			state.attempt += 1;

			obs::record_request_outcome(RequestOutcome::Attempt);

			let error = match operation().await {
				Ok(value) => return Ok(value),
				Err(error) => error,
			};

			if error.classify() == FailureClass::Terminal {
				return Err(SequencerError::Terminal { attempts: state.attempt, source: error });
			}

			obs::record_request_outcome(RequestOutcome::Throttled);

			let Some(delay) = state.next_delay() else {
				return Err(SequencerError::RetriesExhausted {
					attempts: state.attempt,
					last: error,
				});
			};

			obs::log_retry_wait(state.attempt, delay);
			on_retry(state.attempt, delay);
			tokio::time::sleep(delay).await;
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			initial_backoff: Self::DEFAULT_INITIAL_BACKOFF,
		}
	}
}

/// Transient retry bookkeeping for a single operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffState {
	/// Attempts started so far.
	pub attempt: u32,
	/// Wait to apply before the next retry.
	pub delay: Duration,
	max_attempts: u32,
}
impl BackoffState {
	/// Starts fresh bookkeeping for `policy`.
	pub fn new(policy: &RetryPolicy) -> Self {
		Self { attempt: 0, delay: policy.initial_backoff, max_attempts: policy.max_attempts }
	}

	/// Returns the wait before the next attempt and doubles the delay, or `None` once the
	/// attempt budget is spent.
	pub fn next_delay(&mut self) -> Option<Duration> {
		if self.attempt >= self.max_attempts {
			return None;
		}

		let delay = self.delay;

		self.delay = self.delay.saturating_mul(2);

		Some(delay)
	}
}
