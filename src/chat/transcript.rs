//! Plain transcript export for saved conversations.

// self
use crate::{_prelude::*, chat::Message};

/// Download flavor for a transcript produced by [`render_transcript`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
	/// `.txt` download.
	#[default]
	Text,
	/// `.md` download.
	Markdown,
}
impl TranscriptFormat {
	/// Suggested file name for the download.
	pub const fn file_name(self) -> &'static str {
		match self {
			TranscriptFormat::Text => "chat-history.txt",
			TranscriptFormat::Markdown => "chat-history.md",
		}
	}

	/// MIME type for the download.
	pub const fn mime_type(self) -> &'static str {
		match self {
			TranscriptFormat::Text => "text/plain",
			TranscriptFormat::Markdown => "text/markdown",
		}
	}
}

/// Renders messages as numbered `(n) ROLE: content` blocks separated by blank lines.
///
/// Both [`TranscriptFormat`]s share this body.
pub fn render_transcript(messages: &[Message]) -> String {
	messages
		.iter()
		.enumerate()
		.map(|(i, message)| {
			format!("({}) {}: {}", i + 1, message.role.as_str().to_uppercase(), message.content)
		})
		.collect::<Vec<_>>()
		.join("\n\n")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn transcript_numbers_messages() {
		let messages = [Message::user("What is Rust?"), Message::assistant("A language.")];

		assert_eq!(
			render_transcript(&messages),
			"(1) USER: What is Rust?\n\n(2) ASSISTANT: A language."
		);
		assert_eq!(render_transcript(&[]), "");
		assert_eq!(TranscriptFormat::default().file_name(), "chat-history.txt");
		assert_eq!(TranscriptFormat::Markdown.mime_type(), "text/markdown");
	}
}
