//! User-facing notifications (retry progress, history outcomes) and the sinks that receive them.

// self
use crate::_prelude::*;

/// Severity attached to a [`Notification`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
	/// Neutral progress update.
	Info,
	/// Completed action.
	Success,
	/// Degraded but recoverable state.
	Warning,
	/// Failed action.
	Error,
}
impl NotificationLevel {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			NotificationLevel::Info => "info",
			NotificationLevel::Success => "success",
			NotificationLevel::Warning => "warning",
			NotificationLevel::Error => "error",
		}
	}
}
impl Display for NotificationLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Message surfaced to whoever renders progress for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	/// Severity of the message.
	pub level: NotificationLevel,
	/// Human-readable text.
	pub message: String,
}
impl Notification {
	/// Creates a notification with an explicit level.
	pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
		Self { level, message: message.into() }
	}

	/// Shorthand for [`NotificationLevel::Info`].
	pub fn info(message: impl Into<String>) -> Self {
		Self::new(NotificationLevel::Info, message)
	}

	/// Shorthand for [`NotificationLevel::Success`].
	pub fn success(message: impl Into<String>) -> Self {
		Self::new(NotificationLevel::Success, message)
	}

	/// Shorthand for [`NotificationLevel::Error`].
	pub fn error(message: impl Into<String>) -> Self {
		Self::new(NotificationLevel::Error, message)
	}

	/// Announces a throttling backoff of `delay`.
	pub fn retrying(delay: Duration) -> Self {
		Self::info(format!("API busy. Retrying in {}s...", format_seconds(delay)))
	}
}

/// Receiver for [`Notification`]s.
pub trait NotificationSink
where
	Self: Send + Sync,
{
	/// Delivers a notification; implementations must not block.
	fn notify(&self, notification: Notification);
}
impl<F> NotificationSink for F
where
	F: Send + Sync + Fn(Notification),
{
	fn notify(&self, notification: Notification) {
		self(notification)
	}
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;
impl NotificationSink for NoopSink {
	fn notify(&self, _: Notification) {}
}

/// Sink that records notifications in delivery order.
#[derive(Debug, Default)]
pub struct MemorySink(Mutex<Vec<Notification>>);
impl MemorySink {
	/// Returns a copy of every recorded notification.
	pub fn snapshot(&self) -> Vec<Notification> {
		self.0.lock().clone()
	}

	/// Returns the recorded messages without their levels.
	pub fn messages(&self) -> Vec<String> {
		self.0.lock().iter().map(|n| n.message.clone()).collect()
	}

	/// Number of recorded notifications.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when nothing was recorded.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}
impl NotificationSink for MemorySink {
	fn notify(&self, notification: Notification) {
		self.0.lock().push(notification);
	}
}

/// Sink that forwards notifications as `tracing` events under the `chat_relay.notify` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
#[cfg(feature = "tracing")]
impl NotificationSink for TracingSink {
	fn notify(&self, notification: Notification) {
		let Notification { level, message } = notification;

		match level {
			NotificationLevel::Error => tracing::error!(target: "chat_relay.notify", %message),
			NotificationLevel::Warning => tracing::warn!(target: "chat_relay.notify", %message),
			NotificationLevel::Info | NotificationLevel::Success =>
				tracing::info!(target: "chat_relay.notify", kind = level.as_str(), %message),
		}
	}
}

fn format_seconds(delay: Duration) -> String {
	if delay.subsec_nanos() == 0 {
		delay.as_secs().to_string()
	} else {
		format!("{}", delay.as_secs_f64())
	}
}
