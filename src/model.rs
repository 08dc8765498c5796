//! Boundary to the external generative-language API.
//!
//! The relay only depends on [`GenerativeClient`]; callers may plug in any SDK or transport.
//! With the `reqwest` feature the crate ships [`GeminiClient`], a thin REST transport for the
//! `generateContent` endpoint.

#[cfg(feature = "reqwest")] pub mod gemini;
#[cfg(feature = "reqwest")] pub use gemini::GeminiClient;

// self
use crate::{_prelude::*, chat::Message, error::ApiError};

/// Boxed future returned by [`GenerativeClient::generate`].
pub type GenerateFuture<'a> =
	Pin<Box<dyn Future<Output = Result<GenerateResponse, ApiError>> + 'a + Send>>;

/// Sampling parameters forwarded with every request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
	/// Sampling temperature.
	pub temperature: f32,
	/// Upper bound for generated tokens.
	pub max_output_tokens: u32,
}
impl Default for GenerationConfig {
	fn default() -> Self {
		Self { temperature: 0.7, max_output_tokens: 1024 }
	}
}

/// Single chat turn sent to the API.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
	/// Model name, e.g. `gemini-2.0-flash`.
	pub model: String,
	/// Earlier messages used as context, oldest first.
	pub history: Vec<Message>,
	/// New user prompt.
	pub prompt: String,
	/// Sampling parameters.
	pub config: GenerationConfig,
}

/// Text produced by the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateResponse {
	/// Concatenated candidate text.
	pub text: String,
}
impl GenerateResponse {
	/// Wraps generated text.
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into() }
	}
}

/// Client for the generative API: `invoke(request) -> response | throttling | other error`.
///
/// Implementations report rate limiting as an [`ApiError`] that classifies as throttling so the
/// sequencer can back off; every other failure is surfaced to the caller untouched.
pub trait GenerativeClient
where
	Self: Send + Sync,
{
	/// Sends one chat turn and returns the generated reply.
	fn generate(&self, request: GenerateRequest) -> GenerateFuture<'_>;
}
