//! Reqwest-backed REST transport for the Gemini `generateContent` endpoint.

// crates.io
use reqwest::{
	StatusCode,
	header::{HeaderMap, RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	chat::{Message, Role},
	error::{ApiError, ConfigError},
	model::{GenerateFuture, GenerateRequest, GenerateResponse, GenerationConfig, GenerativeClient},
	sequencer::classify_message,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Thin wrapper around [`ReqwestClient`] that speaks the Gemini REST dialect.
///
/// Requests are sent to `{base_url}v1beta/models/{model}:generateContent` with the API key in the
/// `x-goog-api-key` header. HTTP 429 and `RESOURCE_EXHAUSTED` bodies become
/// [`ApiError::Throttled`]; other non-success responses become [`ApiError::Rejected`].
#[derive(Clone)]
pub struct GeminiClient {
	http: ReqwestClient,
	base_url: Url,
	api_key: String,
}
impl GeminiClient {
	/// Public Gemini API root.
	pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";

	/// Creates a client for the public API root.
	pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
		Self::with_base_url(api_key, Self::DEFAULT_BASE_URL)
	}

	/// Creates a client rooted at `base_url` (a trailing slash is added when missing).
	pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self, ConfigError> {
		let mut base_url =
			Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());

			base_url.set_path(&path);
		}

		Ok(Self { http: ReqwestClient::default(), base_url, api_key: api_key.into() })
	}

	/// Replaces the underlying reqwest [`ReqwestClient`].
	pub fn with_client(mut self, client: ReqwestClient) -> Self {
		self.http = client;

		self
	}

	/// API root requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn endpoint(&self, model: &str) -> Result<Url, ApiError> {
		self.base_url.join(&format!("v1beta/models/{model}:generateContent")).map_err(|e| {
			ApiError::rejected(format!("Model `{model}` does not form a valid endpoint: {e}"), None)
		})
	}

	async fn generate_now(&self, request: GenerateRequest) -> Result<GenerateResponse, ApiError> {
		let endpoint = self.endpoint(&request.model)?;
		let body = WireRequest::from_request(&request);
		let response = self
			.http
			.post(endpoint)
			.header(API_KEY_HEADER, &self.api_key)
			.json(&body)
			.send()
			.await?;
		let status = response.status();
		let retry_after = parse_retry_after(response.headers());
		let bytes = response.bytes().await?;

		if !status.is_success() {
			return Err(map_failure(status, retry_after, &bytes));
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);
		let parsed: WireResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ApiError::ResponseParse { source, status: Some(status.as_u16()) })?;
		let text = parsed.into_text().ok_or(ApiError::EmptyResponse)?;

		Ok(GenerateResponse { text })
	}
}
impl GenerativeClient for GeminiClient {
	fn generate(&self, request: GenerateRequest) -> GenerateFuture<'_> {
		Box::pin(self.generate_now(request))
	}
}
impl Debug for GeminiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GeminiClient")
			.field("base_url", &self.base_url.as_str())
			.field("api_key_set", &!self.api_key.is_empty())
			.finish()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
	contents: Vec<WireContent<'a>>,
	generation_config: GenerationConfig,
}
impl<'a> WireRequest<'a> {
	fn from_request(request: &'a GenerateRequest) -> Self {
		let mut contents = request.history.iter().map(WireContent::from_message).collect::<Vec<_>>();

		contents.push(WireContent {
			role: Role::User.api_name(),
			parts: [WirePart { text: &request.prompt }],
		});

		Self { contents, generation_config: request.config }
	}
}

#[derive(Serialize)]
struct WireContent<'a> {
	role: &'static str,
	parts: [WirePart<'a>; 1],
}
impl<'a> WireContent<'a> {
	fn from_message(message: &'a Message) -> Self {
		Self { role: message.role.api_name(), parts: [WirePart { text: &message.content }] }
	}
}

#[derive(Serialize)]
struct WirePart<'a> {
	text: &'a str,
}

#[derive(Deserialize)]
struct WireResponse {
	#[serde(default)]
	candidates: Vec<WireCandidate>,
}
impl WireResponse {
	fn into_text(self) -> Option<String> {
		let text = self
			.candidates
			.into_iter()
			.next()?
			.content?
			.parts
			.into_iter()
			.filter_map(|part| part.text)
			.collect::<String>();

		(!text.is_empty()).then_some(text)
	}
}

#[derive(Deserialize)]
struct WireCandidate {
	content: Option<WireCandidateContent>,
}

#[derive(Deserialize)]
struct WireCandidateContent {
	#[serde(default)]
	parts: Vec<WireResponsePart>,
}

#[derive(Deserialize)]
struct WireResponsePart {
	text: Option<String>,
}

#[derive(Deserialize)]
struct WireErrorEnvelope {
	error: WireError,
}

#[derive(Deserialize)]
struct WireError {
	#[serde(default)]
	message: String,
	#[serde(default)]
	status: Option<String>,
}

fn map_failure(status: StatusCode, retry_after: Option<Duration>, body: &[u8]) -> ApiError {
	let message = describe_failure(status, body);
	let code = Some(status.as_u16());

	if status == StatusCode::TOO_MANY_REQUESTS || classify_message(&message).is_throttling() {
		ApiError::Throttled { message, status: code, retry_after }
	} else {
		ApiError::Rejected { message, status: code }
	}
}

fn describe_failure(status: StatusCode, body: &[u8]) -> String {
	match serde_json::from_slice::<WireErrorEnvelope>(body) {
		Ok(WireErrorEnvelope { error: WireError { message, status: Some(label) } }) =>
			format!("[{status}] {message} ({label})"),
		Ok(WireErrorEnvelope { error: WireError { message, status: None } }) =>
			format!("[{status}] {message}"),
		Err(_) => format!("[{status}] {}", String::from_utf8_lossy(body).trim()),
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Duration::try_from(delta).ok();
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderValue;
	// self
	use super::*;
	use crate::sequencer::{Classify, FailureClass};

	#[test]
	fn wire_request_maps_roles_and_appends_prompt() {
		let request = GenerateRequest {
			model: "gemini-2.0-flash".into(),
			history: vec![Message::user("hi"), Message::assistant("hello")],
			prompt: "how are you?".into(),
			config: GenerationConfig { temperature: 0.5, max_output_tokens: 64 },
		};
		let json = serde_json::to_value(WireRequest::from_request(&request))
			.expect("Wire request should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"contents": [
					{ "role": "user", "parts": [{ "text": "hi" }] },
					{ "role": "model", "parts": [{ "text": "hello" }] },
					{ "role": "user", "parts": [{ "text": "how are you?" }] },
				],
				"generationConfig": { "temperature": 0.5, "maxOutputTokens": 64 },
			})
		);
	}

	#[test]
	fn wire_response_concatenates_first_candidate() {
		let response: WireResponse = serde_json::from_str(
			"{\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"},{\"text\":\"lo\"}]}}]}",
		)
		.expect("Response fixture should parse.");

		assert_eq!(response.into_text(), Some("Hello".into()));

		let empty: WireResponse =
			serde_json::from_str("{\"candidates\":[]}").expect("Empty fixture should parse.");

		assert_eq!(empty.into_text(), None);
	}

	#[test]
	fn failures_classify_by_status_and_body() {
		let throttled = map_failure(
			StatusCode::TOO_MANY_REQUESTS,
			Some(Duration::from_secs(3)),
			b"{\"error\":{\"code\":429,\"message\":\"Quota exceeded\",\"status\":\"RESOURCE_EXHAUSTED\"}}",
		);

		assert!(matches!(
			throttled,
			ApiError::Throttled { status: Some(429), retry_after: Some(_), .. }
		));

		let exhausted_body = map_failure(
			StatusCode::SERVICE_UNAVAILABLE,
			None,
			b"{\"error\":{\"message\":\"busy\",\"status\":\"RESOURCE_EXHAUSTED\"}}",
		);

		assert_eq!(exhausted_body.classify(), FailureClass::Throttling);

		let invalid = map_failure(
			StatusCode::BAD_REQUEST,
			None,
			b"{\"error\":{\"message\":\"API key not valid\",\"status\":\"INVALID_ARGUMENT\"}}",
		);

		assert!(matches!(invalid, ApiError::Rejected { status: Some(400), .. }));
		assert!(invalid.to_string().contains("API key not valid"));
		assert_eq!(
			describe_failure(StatusCode::BAD_GATEWAY, b"upstream down\n"),
			"[502 Bad Gateway] upstream down"
		);
	}

	#[test]
	fn retry_after_accepts_seconds() {
		let mut headers = HeaderMap::new();

		assert_eq!(parse_retry_after(&headers), None);

		headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));

		assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));

		assert_eq!(parse_retry_after(&headers), None);
	}

	#[test]
	fn base_url_gains_trailing_slash() {
		let client = GeminiClient::with_base_url("key", "http://127.0.0.1:9/api")
			.expect("Base URL should parse.");

		assert_eq!(client.base_url().as_str(), "http://127.0.0.1:9/api/");
		assert_eq!(
			client.endpoint("gemini-2.0-flash").expect("Endpoint should resolve.").as_str(),
			"http://127.0.0.1:9/api/v1beta/models/gemini-2.0-flash:generateContent"
		);
		assert!(matches!(
			GeminiClient::with_base_url("key", "not a url"),
			Err(ConfigError::InvalidBaseUrl { .. })
		));
	}
}
