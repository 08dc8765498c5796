//! Relay-level error types shared across the sequencer, stores, chat history, and model clients.

// self
use crate::{
	_prelude::*,
	sequencer::{Classify, FailureClass, SequencerError, classify_message},
};

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Conversation identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::chat::IdentifierError),
	/// Generative API call failed after the sequencer gave up on it.
	#[error(transparent)]
	Request(#[from] SequencerError<ApiError>),

	/// Conversation is not present in the history.
	#[error("Conversation `{id}` does not exist.")]
	ConversationNotFound {
		/// Identifier that was looked up.
		id: String,
	},
	/// Message index is outside the conversation.
	#[error("Conversation `{id}` has no message at index {index}.")]
	MessageNotFound {
		/// Conversation identifier.
		id: String,
		/// Requested message index.
		index: usize,
	},
	/// Prompt was empty or whitespace.
	#[error("Prompt cannot be empty.")]
	EmptyPrompt,
	/// Conversation title was empty or whitespace.
	#[error("Title cannot be empty.")]
	EmptyTitle,
}

/// Configuration and validation failures raised by the relay.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Underlying builder failure rendered as text.
		message: String,
	},
	/// Base URL for the generative API cannot be used.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Sequencer must allow at least one attempt.
	#[error("The maximum attempt count must be at least 1.")]
	ZeroAttempts,
	/// Initial backoff must be non-zero so doubling makes progress.
	#[error("The initial backoff must be greater than zero.")]
	ZeroBackoff,
	/// Temperature outside the supported range.
	#[error("Temperature {value} is outside 0.0..=2.0.")]
	TemperatureOutOfRange {
		/// Rejected temperature.
		value: f32,
	},
	/// Output token budget must be positive.
	#[error("The maximum output token count must be greater than zero.")]
	ZeroMaxTokens,
	/// Context window must include at least one message.
	#[error("The context window must include at least one message.")]
	ZeroContextWindow,
	/// Model name was empty.
	#[error("Model name cannot be empty.")]
	EmptyModel,
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::HttpClientBuild { message: e.to_string() }
	}
}

/// Failures reported by a [`GenerativeClient`](crate::model::GenerativeClient).
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// Upstream signaled rate limiting; retry with backoff.
	#[error("Generative API is throttling requests: {message}.")]
	Throttled {
		/// Provider-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream rejected the request.
	#[error("Generative API rejected the request: {message}.")]
	Rejected {
		/// Provider-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network failure while calling the API.
	#[error("Network error occurred while calling the generative API.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Response body could not be parsed.
	#[error("Generative API returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Response carried no candidate text.
	#[error("Generative API returned no candidate text.")]
	EmptyResponse,
}
impl ApiError {
	/// Builds a throttling failure without transport metadata.
	pub fn throttled(message: impl Into<String>) -> Self {
		Self::Throttled { message: message.into(), status: None, retry_after: None }
	}

	/// Builds a rejection with an optional HTTP status.
	pub fn rejected(message: impl Into<String>, status: Option<u16>) -> Self {
		Self::Rejected { message: message.into(), status }
	}

	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}

	/// Classifies a bare error message, producing [`ApiError::Throttled`] when it carries a
	/// throttling marker and [`ApiError::Rejected`] otherwise.
	pub fn from_message(message: impl Into<String>) -> Self {
		let message = message.into();

		match classify_message(&message) {
			FailureClass::Throttling => Self::throttled(message),
			FailureClass::Terminal => Self::rejected(message, None),
		}
	}

	/// HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Throttled { status, .. }
			| Self::Rejected { status, .. }
			| Self::ResponseParse { status, .. } => *status,
			Self::Transport { .. } | Self::EmptyResponse => None,
		}
	}
}
impl Classify for ApiError {
	fn classify(&self) -> FailureClass {
		match self {
			Self::Throttled { .. } => FailureClass::Throttling,
			Self::Rejected { status: Some(429), .. } => FailureClass::Throttling,
			Self::Rejected { message, .. } => classify_message(message),
			Self::Transport { .. } | Self::ResponseParse { .. } | Self::EmptyResponse =>
				FailureClass::Terminal,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ApiError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}
