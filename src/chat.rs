//! Conversation model: identifiers, messages, persisted history, and transcript export.

pub mod history;
pub mod id;
pub mod transcript;

pub use history::*;
pub use id::*;
pub use transcript::*;

// crates.io
use time::{Date, Time};
// self
use crate::_prelude::*;

/// Title given to freshly created conversations.
pub const DEFAULT_TITLE: &str = "New Conversation";

const SUMMARY_MAX_CHARS: usize = 60;

/// How far back a [`MessageFilter`] reaches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
	/// No time restriction.
	#[default]
	All,
	/// Since midnight of the reference instant's day.
	Today,
	/// The last seven days.
	Week,
	/// Since the same day of the previous month.
	Month,
}
impl TimeRange {
	/// Earliest timestamp kept relative to `now`, or `None` for [`TimeRange::All`].
	pub fn cutoff(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
		match self {
			TimeRange::All => None,
			TimeRange::Today => Some(now.replace_time(Time::MIDNIGHT)),
			TimeRange::Week => Some(now - time::Duration::days(7)),
			TimeRange::Month => Some(month_before(now)),
		}
	}
}

/// Message view options for a conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageFilter {
	/// Keep only bookmarked messages.
	pub bookmarked: bool,
	/// Keep only messages newer than this range.
	pub time_range: TimeRange,
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	/// Message typed by the user.
	User,
	/// Message produced by the generative model.
	Assistant,
}
impl Role {
	/// Returns the stored label (`user` / `assistant`).
	pub const fn as_str(self) -> &'static str {
		match self {
			Role::User => "user",
			Role::Assistant => "assistant",
		}
	}

	/// Returns the role name understood by the generative API (`user` / `model`).
	pub const fn api_name(self) -> &'static str {
		match self {
			Role::User => "user",
			Role::Assistant => "model",
		}
	}
}
impl Display for Role {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Single chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	/// Author of the message.
	pub role: Role,
	/// Plain-text body.
	pub content: String,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Whether the user bookmarked this message.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub bookmarked: bool,
}
impl Message {
	/// Creates a message stamped with the current UTC instant.
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self::at(role, content, OffsetDateTime::now_utc())
	}

	/// Creates a message with an explicit timestamp.
	pub fn at(role: Role, content: impl Into<String>, timestamp: OffsetDateTime) -> Self {
		Self { role, content: content.into(), timestamp, bookmarked: false }
	}

	/// Shorthand for a [`Role::User`] message.
	pub fn user(content: impl Into<String>) -> Self {
		Self::new(Role::User, content)
	}

	/// Shorthand for a [`Role::Assistant`] message.
	pub fn assistant(content: impl Into<String>) -> Self {
		Self::new(Role::Assistant, content)
	}
}

/// Saved conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
	/// Unique identifier.
	pub id: ConversationId,
	/// Display title.
	pub title: String,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
	/// Messages in chronological order.
	#[serde(default)]
	pub messages: Vec<Message>,
}
impl Conversation {
	/// Creates an empty conversation titled [`DEFAULT_TITLE`].
	pub fn new(id: ConversationId, timestamp: OffsetDateTime) -> Self {
		Self { id, title: DEFAULT_TITLE.into(), timestamp, messages: Vec::new() }
	}

	/// Index of the last user message strictly before `index`.
	pub fn last_user_before(&self, index: usize) -> Option<usize> {
		let end = index.min(self.messages.len());

		self.messages[..end].iter().rposition(|message| message.role == Role::User)
	}

	/// Messages matching `filter`, evaluated against the reference instant `now`.
	pub fn filtered(&self, filter: &MessageFilter, now: OffsetDateTime) -> Vec<&Message> {
		let cutoff = filter.time_range.cutoff(now);

		self.messages
			.iter()
			.filter(|message| !filter.bookmarked || message.bookmarked)
			.filter(|message| cutoff.is_none_or(|cutoff| message.timestamp >= cutoff))
			.collect()
	}

	/// Short label for conversation lists: the first user message, cut to 60 characters.
	pub fn summary(&self) -> String {
		if self.messages.is_empty() {
			return "Empty conversation".into();
		}

		let Some(first) = self.messages.iter().find(|message| message.role == Role::User) else {
			return "Conversation".into();
		};

		match first.content.char_indices().nth(SUMMARY_MAX_CHARS) {
			Some((end, _)) => format!("{}...", &first.content[..end]),
			None => first.content.clone(),
		}
	}

	/// Returns at most `window` of the most recent messages.
	pub fn recent(&self, window: usize) -> &[Message] {
		let start = self.messages.len().saturating_sub(window);

		&self.messages[start..]
	}
}

fn month_before(now: OffsetDateTime) -> OffsetDateTime {
	let month = now.month().previous();
	let year = if month == time::Month::December { now.year() - 1 } else { now.year() };
	// Days missing from the shorter month clamp to its last day.
	let date =
		(1..=now.day()).rev().find_map(|day| Date::from_calendar_date(year, month, day).ok());

	match date {
		Some(date) => now.replace_date(date),
		None => now - time::Duration::days(30),
	}
}
