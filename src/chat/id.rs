//! Strongly typed conversation identifiers.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Conversation identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Conversation identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Conversation identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Unique identifier for a saved conversation.
///
/// Fresh identifiers are the creation time in Unix milliseconds rendered as decimal text, which
/// keeps them sortable and compatible with histories written by browser clients.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);
impl ConversationId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Builds an identifier from a Unix millisecond timestamp.
	pub fn from_millis(millis: i128) -> Self {
		Self(millis.to_string())
	}
}
impl Deref for ConversationId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ConversationId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<ConversationId> for String {
	fn from(value: ConversationId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ConversationId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for ConversationId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for ConversationId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Conversation({})", self.0)
	}
}
impl Display for ConversationId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for ConversationId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
