//! FIFO request sequencer with a single worker, inter-request cooldown, and throttling retries.
//!
//! [`Sequencer::spawn`] starts one tokio task that owns the pending list. Every
//! [`Sequencer::submit`] call enqueues a [`QueuedRequest`] through an unbounded channel and hands
//! back a [`Submission`] future that resolves once the worker has executed the operation under the
//! configured [`RetryPolicy`]. The worker runs exactly one request at a time, removes it from the
//! pending list only after it resolves, and sleeps for the configured cooldown before starting the
//! next one.

mod classify;
mod retry;
mod stats;

pub use classify::*;
pub use retry::*;
pub use stats::SequencerStats;

// std
use std::task::{Context, Poll};
// crates.io
use tokio::sync::{mpsc, oneshot};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	notify::{Notification, NotificationSink},
	obs::{self, RequestOutcome, RequestSpan},
};

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Job = Box<dyn FnOnce(Arc<Worker>) -> JobFuture + Send>;

/// Failure returned to the submitter of a queued operation.
#[derive(Debug, ThisError)]
pub enum SequencerError<E> {
	/// The operation failed with a non-throttling error and was not retried.
	#[error("Request failed after {attempts} attempt(s): {source}")]
	Terminal {
		/// Attempts made before the failure, including the failing one.
		attempts: u32,
		/// Error returned by the final attempt.
		#[source]
		source: E,
	},
	/// The operation kept being throttled until the attempt budget ran out.
	#[error("Request was still throttled after {attempts} attempts: {last}")]
	RetriesExhausted {
		/// Attempts made, equal to the policy's `max_attempts`.
		attempts: u32,
		/// Error returned by the final attempt.
		#[source]
		last: E,
	},
	/// The worker stopped before the request resolved.
	#[error("Request sequencer dropped the request before it resolved.")]
	Closed,
}
impl<E> SequencerError<E> {
	/// Returns `true` when the request gave up because of persistent throttling.
	pub fn is_exhausted(&self) -> bool {
		matches!(self, Self::RetriesExhausted { .. })
	}

	/// Number of attempts made, or `0` when the request never ran.
	pub fn attempts(&self) -> u32 {
		match self {
			Self::Terminal { attempts, .. } | Self::RetriesExhausted { attempts, .. } => *attempts,
			Self::Closed => 0,
		}
	}

	/// Returns the underlying operation error, if the operation ran.
	pub fn into_inner(self) -> Option<E> {
		match self {
			Self::Terminal { source, .. } => Some(source),
			Self::RetriesExhausted { last, .. } => Some(last),
			Self::Closed => None,
		}
	}
}

/// Timing configuration for a [`Sequencer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerConfig {
	/// Pause between one request resolving and the next one starting.
	pub cooldown: Duration,
	/// Retry policy applied to every request.
	pub retry: RetryPolicy,
}
impl SequencerConfig {
	/// Cooldown used by [`SequencerConfig::default`].
	pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

	/// Starts a builder seeded with the defaults.
	pub fn builder() -> SequencerConfigBuilder {
		SequencerConfigBuilder::default()
	}

	/// Checks the attempt budget and initial backoff.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::ZeroAttempts);
		}
		if self.retry.initial_backoff.is_zero() {
			return Err(ConfigError::ZeroBackoff);
		}

		Ok(())
	}
}
impl Default for SequencerConfig {
	fn default() -> Self {
		Self { cooldown: Self::DEFAULT_COOLDOWN, retry: RetryPolicy::default() }
	}
}

/// Builder for [`SequencerConfig`] values.
#[derive(Debug, Default)]
pub struct SequencerConfigBuilder {
	config: SequencerConfig,
}
impl SequencerConfigBuilder {
	/// Overrides the inter-request cooldown.
	pub fn cooldown(mut self, cooldown: Duration) -> Self {
		self.config.cooldown = cooldown;

		self
	}

	/// Overrides the total attempt budget for throttled requests.
	pub fn max_attempts(mut self, attempts: u32) -> Self {
		self.config.retry.max_attempts = attempts;

		self
	}

	/// Overrides the first backoff wait.
	pub fn initial_backoff(mut self, backoff: Duration) -> Self {
		self.config.retry.initial_backoff = backoff;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SequencerConfig, ConfigError> {
		self.config.validate()?;

		Ok(self.config)
	}
}

/// Unit of work waiting in the sequencer's pending list.
pub struct QueuedRequest {
	/// Monotonic identifier assigned at submission.
	pub id: u64,
	job: Option<Job>,
}
impl Debug for QueuedRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QueuedRequest")
			.field("id", &self.id)
			.field("started", &self.job.is_none())
			.finish()
	}
}

/// Handle to a running request sequencer.
///
/// Cloning the handle shares the same worker. The worker exits once every handle is dropped and
/// the pending list has drained.
#[derive(Clone)]
pub struct Sequencer {
	intake: mpsc::UnboundedSender<QueuedRequest>,
	stats: Arc<SequencerStats>,
	next_id: Arc<Mutex<u64>>,
}
impl Sequencer {
	/// Validates `config` and starts the worker on the current tokio runtime.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime, like [`tokio::spawn`].
	pub fn spawn(
		config: SequencerConfig,
		sink: Arc<dyn NotificationSink>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let (intake, receiver) = mpsc::unbounded_channel();
		let stats = Arc::new(SequencerStats::default());
		let worker = Arc::new(Worker { retry: config.retry, sink, stats: stats.clone() });

		tokio::spawn(drive(receiver, worker, config.cooldown));

		Ok(Self { intake, stats, next_id: Default::default() })
	}

	/// Queues `operation` behind every earlier submission.
	///
	/// The operation is invoked once per attempt, so it must be able to rebuild its future.
	/// Identifiers follow queue order, even across concurrent producers.
	pub fn submit<T, E, F, Fut>(&self, mut operation: F) -> Submission<T, E>
	where
		T: 'static + Send,
		E: 'static + Send + Classify,
		F: 'static + Send + FnMut() -> Fut,
		Fut: 'static + Send + Future<Output = Result<T, E>>,
	{
		// Held until the request is in the channel so ids match queue order.
		let mut next_id = self.next_id.lock();
		let id = *next_id;
		let (resolve, receiver) = oneshot::channel();
		let job: Job = Box::new(move |worker: Arc<Worker>| {
			Box::pin(async move {
				let span = RequestSpan::new("execute", id);
				let result = span
					.instrument(worker.retry.run_observed(&mut operation, |_, delay| {
						worker.stats.record_retry();
						worker.sink.notify(Notification::retrying(delay));
					}))
					.await;
				let success = result.is_ok();

				match &result {
					Ok(_) => obs::record_request_outcome(RequestOutcome::Success),
					Err(SequencerError::RetriesExhausted { .. }) =>
						obs::record_request_outcome(RequestOutcome::Exhausted),
					Err(_) => obs::record_request_outcome(RequestOutcome::Failure),
				}

				worker.stats.record_resolved(success);

				// The submitter may have stopped waiting; the outcome is dropped with it.
				let _ = resolve.send(result);
			})
		});

		*next_id += 1;

		self.stats.record_submitted();

		if self.intake.send(QueuedRequest { id, job: Some(job) }).is_err() {
			self.stats.record_dequeued();
		}

		drop(next_id);

		Submission { id, receiver }
	}

	/// Shared counters for this sequencer.
	pub fn stats(&self) -> &SequencerStats {
		&self.stats
	}
}
impl Debug for Sequencer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Sequencer")
			.field("pending", &self.stats.pending())
			.field("closed", &self.intake.is_closed())
			.finish()
	}
}

/// Deferred result of [`Sequencer::submit`].
#[derive(Debug)]
pub struct Submission<T, E> {
	id: u64,
	receiver: oneshot::Receiver<Result<T, SequencerError<E>>>,
}
impl<T, E> Submission<T, E> {
	/// Identifier assigned to the queued request.
	pub fn id(&self) -> u64 {
		self.id
	}
}
impl<T, E> Future for Submission<T, E> {
	type Output = Result<T, SequencerError<E>>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.receiver)
			.poll(cx)
			.map(|received| received.unwrap_or(Err(SequencerError::Closed)))
	}
}

struct Worker {
	retry: RetryPolicy,
	sink: Arc<dyn NotificationSink>,
	stats: Arc<SequencerStats>,
}

async fn drive(
	mut intake: mpsc::UnboundedReceiver<QueuedRequest>,
	worker: Arc<Worker>,
	cooldown: Duration,
) {
	let mut pending = VecDeque::<QueuedRequest>::new();

	loop {
		while let Ok(request) = intake.try_recv() {
			pending.push_back(request);
		}

		if pending.is_empty() {
			match intake.recv().await {
				Some(request) => pending.push_back(request),
				None => break,
			}
		}

		let Some(job) = pending.front_mut().and_then(|request| request.job.take()) else {
			pending.pop_front();

			continue;
		};

		// A panicking job only drops its own resolver; the worker keeps draining.
		if tokio::spawn(job(worker.clone())).await.is_err() {
			obs::record_request_outcome(RequestOutcome::Failure);
			worker.stats.record_resolved(false);
		}

		pending.pop_front();
		worker.stats.record_dequeued();

		if !cooldown.is_zero() {
			tokio::time::sleep(cooldown).await;
		}
	}
}
