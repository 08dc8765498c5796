// std
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Thread-safe counters describing sequencer activity.
#[derive(Debug, Default)]
pub struct SequencerStats {
	submitted: AtomicU64,
	completed: AtomicU64,
	failed: AtomicU64,
	retries: AtomicU64,
	pending: AtomicUsize,
}
impl SequencerStats {
	/// Returns the total number of submitted requests.
	pub fn submitted(&self) -> u64 {
		self.submitted.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that resolved successfully.
	pub fn completed(&self) -> u64 {
		self.completed.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that resolved with an error.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of throttling retries scheduled across all requests.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of requests queued or in flight.
	pub fn pending(&self) -> usize {
		self.pending.load(Ordering::Relaxed)
	}

	pub(crate) fn record_submitted(&self) {
		self.submitted.fetch_add(1, Ordering::Relaxed);
		self.pending.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_resolved(&self, success: bool) {
		if success {
			self.completed.fetch_add(1, Ordering::Relaxed);
		} else {
			self.failed.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_dequeued(&self) {
		let _ = self
			.pending
			.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| value.checked_sub(1));
	}
}
