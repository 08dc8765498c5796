// std
use std::{env, fs, path::PathBuf, process};
// self
use chat_relay::{
	_preludet::*,
	chat::{Role, TranscriptFormat, render_transcript},
	error::ApiError,
	model::GenerateResponse,
	notify::NoopSink,
	session::{ApiStatus, ChatSession, SEND_FALLBACK},
	settings::{ChatSettings, Theme},
	store::{FileStore, KeyValueStore},
};

fn temp_path(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"chat_relay_session_{label}_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

#[tokio::test]
async fn conversation_survives_reopening_a_file_store() {
	let path = temp_path("reopen");
	let store: Arc<dyn KeyValueStore> =
		Arc::new(FileStore::open(&path).expect("File store should open."));
	let client = Arc::new(ScriptedClient::new([Ok(GenerateResponse::new("Rust is a language."))]));
	let (sequencer, _sink) = instant_sequencer();
	let session = ChatSession::open(store, client, sequencer, Arc::new(NoopSink))
		.await
		.expect("Session should open.");
	let exchange = session.send(None, "What is Rust?").await.expect("Send should succeed.");

	session.toggle_theme().await.expect("Theme toggle should persist.");
	drop(session);

	let reopened: Arc<dyn KeyValueStore> =
		Arc::new(FileStore::open(&path).expect("File store should reopen."));
	let (sequencer, _sink) = instant_sequencer();
	let client = Arc::new(ScriptedClient::default());
	let session = ChatSession::open(reopened, client, sequencer, Arc::new(NoopSink))
		.await
		.expect("Session should reopen.");
	let snapshot = session.history().load().await.expect("History should load.");
	let active = snapshot.active_conversation().expect("Active conversation should be restored.");

	assert_eq!(active.id, exchange.conversation_id);
	assert_eq!(session.settings().theme, Theme::Light);
	assert_eq!(
		render_transcript(&active.messages),
		"(1) USER: What is Rust?\n\n(2) ASSISTANT: Rust is a language."
	);
	assert_eq!(TranscriptFormat::Text.file_name(), "chat-history.txt");

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary session store {}: {e}", path.display())
	});
}

#[tokio::test]
async fn throttled_then_recovered_conversation() {
	let (store, _) = memory_store();
	let client = Arc::new(ScriptedClient::new([
		Err(ApiError::from_message("429 Too Many Requests")),
		Err(ApiError::from_message("429 Too Many Requests")),
		Err(ApiError::from_message("429 Too Many Requests")),
		Ok(GenerateResponse::new("Back online.")),
	]));
	let (sequencer, sink) = instant_sequencer();
	let session = ChatSession::open(store, client.clone(), sequencer, sink.clone())
		.await
		.expect("Session should open.");
	let failed = session.send(None, "Hello?").await.expect("Send should store a fallback.");

	assert_eq!(failed.reply.content, SEND_FALLBACK);
	assert_eq!(session.status(), ApiStatus::Limited);
	assert_eq!(sink.len(), 2);

	let id = failed.conversation_id;
	let recovered = session.send(Some(&id), "Still there?").await.expect("Send should succeed.");

	assert!(recovered.is_success());
	assert_eq!(session.status(), ApiStatus::Ready);

	let last = client.requests().pop().expect("Requests should be recorded.");

	assert_eq!(
		last.history.iter().map(|m| (m.role, m.content.as_str())).collect::<Vec<_>>(),
		vec![(Role::User, "Hello?"), (Role::Assistant, SEND_FALLBACK)]
	);
	assert_eq!(session.sequencer().stats().completed(), 1);
	assert_eq!(session.sequencer().stats().failed(), 1);
}

#[tokio::test]
async fn persisted_settings_shape_requests() {
	let (store, _) = memory_store();
	let settings = ChatSettings {
		model: "gemini-1.5-pro".into(),
		temperature: 0.25,
		max_tokens: 256,
		..Default::default()
	};

	settings.save(store.as_ref()).await.expect("Settings should save.");

	let client = Arc::new(ScriptedClient::new([Ok(GenerateResponse::new("ok"))]));
	let (sequencer, _sink) = instant_sequencer();
	let session = ChatSession::open(store, client.clone(), sequencer, Arc::new(NoopSink))
		.await
		.expect("Session should open.");

	session.send(None, "ping").await.expect("Send should succeed.");

	let request = client.requests().pop().expect("Request should be recorded.");

	assert_eq!(request.model, "gemini-1.5-pro");
	assert_eq!(request.config.temperature, 0.25);
	assert_eq!(request.config.max_output_tokens, 256);
}
