//! Chat session tying settings, history, the request sequencer, and the generative client together.

// self
use crate::{
	_prelude::*,
	chat::{ChatHistory, Conversation, ConversationId, HistorySnapshot, Message},
	error::ApiError,
	model::{GenerateRequest, GenerativeClient},
	notify::{Notification, NotificationSink},
	obs,
	sequencer::{Sequencer, SequencerError},
	settings::{ChatSettings, Theme},
	store::KeyValueStore,
};

/// Reply stored when a new prompt could not be answered.
pub const SEND_FALLBACK: &str = "Sorry, I encountered an error. Please try again later.";
/// Reply stored when regenerating an answer failed.
pub const REGENERATE_FALLBACK: &str = "Sorry, I encountered an error. Please try again.";

/// Health of the generative API as observed by the last request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
	/// Last request succeeded (or none was made yet).
	#[default]
	Ready,
	/// Last request ran out of throttling retries.
	Limited,
	/// Last request failed for another reason.
	Error,
}

/// Outcome of one prompt/reply round.
#[derive(Debug)]
pub struct Exchange {
	/// Conversation the reply was appended to.
	pub conversation_id: ConversationId,
	/// Assistant message that was stored; a fallback text when the request failed.
	pub reply: Message,
	/// Request failure behind a fallback reply.
	pub failure: Option<SequencerError<ApiError>>,
}
impl Exchange {
	/// Returns `true` when the reply came from the generative API.
	pub fn is_success(&self) -> bool {
		self.failure.is_none()
	}
}

/// Stateful front door for chatting with a generative model.
pub struct ChatSession {
	store: Arc<dyn KeyValueStore>,
	history: ChatHistory,
	sequencer: Sequencer,
	client: Arc<dyn GenerativeClient>,
	sink: Arc<dyn NotificationSink>,
	settings: RwLock<ChatSettings>,
	status: Mutex<ApiStatus>,
}
impl ChatSession {
	/// Opens a session over `store`, restoring persisted settings.
	pub async fn open(
		store: Arc<dyn KeyValueStore>,
		client: Arc<dyn GenerativeClient>,
		sequencer: Sequencer,
		sink: Arc<dyn NotificationSink>,
	) -> Result<Self> {
		let settings = ChatSettings::load(store.as_ref()).await?;

		Ok(Self {
			history: ChatHistory::new(store.clone()),
			store,
			sequencer,
			client,
			sink,
			settings: RwLock::new(settings),
			status: Default::default(),
		})
	}

	/// Conversation history backing this session.
	pub fn history(&self) -> &ChatHistory {
		&self.history
	}

	/// Sequencer every generation request goes through.
	pub fn sequencer(&self) -> &Sequencer {
		&self.sequencer
	}

	/// Current settings.
	pub fn settings(&self) -> ChatSettings {
		self.settings.read().clone()
	}

	/// Status derived from the most recent request.
	pub fn status(&self) -> ApiStatus {
		*self.status.lock()
	}

	/// Loads saved conversations, announcing an error when they cannot be read.
	pub async fn restore(&self) -> Result<HistorySnapshot> {
		self.history.load().await.inspect_err(|_| {
			self.sink.notify(Notification::error("Could not load saved conversations"));
		})
	}

	/// Sends `prompt` to the model and stores both sides of the exchange.
	///
	/// Without a conversation a new one is created; either way the target becomes the active
	/// conversation. Request failures do not surface as `Err`: a fallback reply is stored and the
	/// failure is reported through [`Exchange::failure`].
	pub async fn send(
		&self,
		conversation: Option<&ConversationId>,
		prompt: &str,
	) -> Result<Exchange> {
		let prompt = prompt.trim();

		if prompt.is_empty() {
			return Err(Error::EmptyPrompt);
		}

		let conversation = match conversation {
			Some(id) => self.require(id).await?,
			None => self.history.create().await?,
		};
		let settings = self.settings();
		let request = GenerateRequest {
			model: settings.model.clone(),
			history: conversation.recent(settings.context_window).to_vec(),
			prompt: prompt.to_owned(),
			config: settings.generation_config(),
		};

		self.history.append(&conversation.id, [Message::user(prompt)]).await?;
		self.history.select(&conversation.id).await?;

		self.complete(conversation.id, request, SEND_FALLBACK).await
	}

	/// Re-asks the last user message before `index`, discarding every later message.
	///
	/// The conversation becomes the active one. Returns `None` when no user message precedes
	/// `index`.
	pub async fn regenerate(
		&self,
		conversation: &ConversationId,
		index: usize,
	) -> Result<Option<Exchange>> {
		let current = self.require(conversation).await?;
		let Some(user_index) = current.last_user_before(index) else {
			return Ok(None);
		};
		let kept = self.history.truncate(conversation, user_index + 1).await?;

		self.history.select(conversation).await?;

		// Another writer may have shortened the conversation in between.
		let Some((question, earlier)) = kept.messages.split_last() else {
			return Ok(None);
		};
		let settings = self.settings();
		let request = GenerateRequest {
			model: settings.model.clone(),
			history: earlier.to_vec(),
			prompt: question.content.clone(),
			config: settings.generation_config(),
		};

		self.complete(kept.id, request, REGENERATE_FALLBACK).await.map(Some)
	}

	/// Validates and persists new settings.
	pub async fn update_settings(&self, settings: ChatSettings) -> Result<()> {
		settings.save(self.store.as_ref()).await?;

		*self.settings.write() = settings;

		Ok(())
	}

	/// Flips the theme, persists it, and returns the new value.
	pub async fn toggle_theme(&self) -> Result<Theme> {
		let mut settings = self.settings();

		settings.theme = settings.theme.toggled();

		let theme = settings.theme;

		self.update_settings(settings).await?;

		Ok(theme)
	}

	/// Flips the bookmark of a message, announces the new state, and returns it.
	pub async fn toggle_bookmark(&self, id: &ConversationId, index: usize) -> Result<bool> {
		let bookmarked = self.history.toggle_bookmark(id, index).await?;

		self.sink.notify(Notification::success(if bookmarked {
			"Message bookmarked"
		} else {
			"Bookmark removed"
		}));

		Ok(bookmarked)
	}

	/// Renames a conversation and announces the change.
	pub async fn rename(&self, id: &ConversationId, title: &str) -> Result<Conversation> {
		let conversation = self.history.rename(id, title).await?;

		self.sink.notify(Notification::success("Title updated"));

		Ok(conversation)
	}

	/// Deletes every conversation and announces the change.
	pub async fn clear_all(&self) -> Result<()> {
		self.history.clear().await?;
		self.sink.notify(Notification::success("All conversations cleared"));

		Ok(())
	}

	async fn require(&self, id: &ConversationId) -> Result<Conversation> {
		self.history
			.get(id)
			.await?
			.ok_or_else(|| Error::ConversationNotFound { id: id.to_string() })
	}

	async fn complete(
		&self,
		conversation_id: ConversationId,
		request: GenerateRequest,
		fallback: &str,
	) -> Result<Exchange> {
		let client = self.client.clone();
		let outcome = self
			.sequencer
			.submit(move || {
				let client = client.clone();
				let request = request.clone();

				async move { client.generate(request).await }
			})
			.await;
		let (reply, failure) = match outcome {
			Ok(response) => {
				*self.status.lock() = ApiStatus::Ready;

				(Message::assistant(response.text), None)
			},
			Err(e) => {
				*self.status.lock() =
					if e.is_exhausted() { ApiStatus::Limited } else { ApiStatus::Error };

				obs::log_request_failure("session", &e);

				(Message::assistant(fallback), Some(e))
			},
		};

		self.history.append(&conversation_id, [reply.clone()]).await?;

		Ok(Exchange { conversation_id, reply, failure })
	}
}
impl Debug for ChatSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ChatSession")
			.field("sequencer", &self.sequencer)
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedClient, instant_sequencer, memory_store},
		chat::Role,
		model::GenerateResponse,
		notify::MemorySink,
		notify::NotificationLevel,
		store::{CONVERSATIONS_KEY, THEME_KEY},
	};

	async fn session(
		replies: Vec<Result<GenerateResponse, ApiError>>,
	) -> (ChatSession, Arc<ScriptedClient>, Arc<MemorySink>) {
		let (store, _) = memory_store();
		let client = Arc::new(ScriptedClient::new(replies));
		let (sequencer, sink) = instant_sequencer();
		let session = ChatSession::open(store, client.clone(), sequencer, sink.clone())
			.await
			.expect("Session should open over an empty store.");

		(session, client, sink)
	}

	#[tokio::test]
	async fn send_creates_conversation_and_stores_both_turns() {
		let (session, client, _) = session(vec![Ok(GenerateResponse::new("Hi!"))]).await;
		let exchange = session.send(None, "  Hello  ").await.expect("Send should succeed.");

		assert!(exchange.is_success());
		assert_eq!(exchange.reply.content, "Hi!");
		assert_eq!(session.status(), ApiStatus::Ready);

		let stored = session
			.history()
			.get(&exchange.conversation_id)
			.await
			.expect("Lookup should succeed.")
			.expect("Conversation should exist.");

		assert_eq!(
			stored.messages.iter().map(|m| (m.role, m.content.as_str())).collect::<Vec<_>>(),
			vec![(Role::User, "Hello"), (Role::Assistant, "Hi!")]
		);

		let requests = client.requests();

		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].prompt, "Hello");
		assert!(requests[0].history.is_empty());
		assert_eq!(requests[0].model, ChatSettings::DEFAULT_MODEL);
	}

	#[tokio::test]
	async fn blank_prompt_is_rejected() {
		let (session, client, _) = session(Vec::new()).await;

		assert!(matches!(session.send(None, " \n ").await, Err(Error::EmptyPrompt)));
		assert!(client.requests().is_empty());
	}

	#[tokio::test]
	async fn context_is_capped_to_window() {
		let replies = (0..3).map(|i| Ok(GenerateResponse::new(format!("r{i}")))).collect();
		let (session, client, _) = session(replies).await;
		let settings = ChatSettings { context_window: 3, ..Default::default() };

		session.update_settings(settings).await.expect("Settings should be valid.");

		let first = session.send(None, "q0").await.expect("Send should succeed.");
		let id = first.conversation_id;

		session.send(Some(&id), "q1").await.expect("Send should succeed.");
		session.send(Some(&id), "q2").await.expect("Send should succeed.");

		let last = client.requests().pop().expect("Requests should be recorded.");

		assert_eq!(
			last.history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
			vec!["r0", "q1", "r1"]
		);
	}

	#[tokio::test]
	async fn exhausted_throttling_stores_fallback_and_marks_limited() {
		let replies =
			(0..3).map(|_| Err(ApiError::from_message("429 Too Many Requests"))).collect();
		let (session, client, sink) = session(replies).await;
		let exchange = session.send(None, "Hello").await.expect("Send should still store a reply.");

		assert_eq!(exchange.reply.content, SEND_FALLBACK);
		assert!(exchange.failure.as_ref().is_some_and(SequencerError::is_exhausted));
		assert_eq!(session.status(), ApiStatus::Limited);
		assert_eq!(client.requests().len(), 3);
		assert_eq!(sink.len(), 2);
	}

	#[tokio::test]
	async fn terminal_failure_marks_error_without_retry() {
		let (session, client, sink) =
			session(vec![Err(ApiError::rejected("invalid argument", Some(400)))]).await;
		let exchange = session.send(None, "Hello").await.expect("Send should still store a reply.");

		assert!(matches!(exchange.failure, Some(SequencerError::Terminal { attempts: 1, .. })));
		assert_eq!(session.status(), ApiStatus::Error);
		assert_eq!(client.requests().len(), 1);
		assert!(sink.is_empty());
	}

	#[tokio::test]
	async fn regenerate_truncates_and_reasks_last_user_message() {
		let replies = vec![
			Ok(GenerateResponse::new("a0")),
			Ok(GenerateResponse::new("a1")),
			Ok(GenerateResponse::new("a1 again")),
		];
		let (session, client, _) = session(replies).await;
		let id = session.send(None, "q0").await.expect("Send should succeed.").conversation_id;

		session.send(Some(&id), "q1").await.expect("Send should succeed.");

		assert!(session.regenerate(&id, 0).await.expect("Regenerate should succeed.").is_none());

		let exchange = session
			.regenerate(&id, 3)
			.await
			.expect("Regenerate should succeed.")
			.expect("A user message precedes index 3.");

		assert_eq!(exchange.reply.content, "a1 again");

		let request = client.requests().pop().expect("Requests should be recorded.");

		assert_eq!(request.prompt, "q1");
		assert_eq!(
			request.history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
			vec!["q0", "a0"]
		);

		let stored = session
			.history()
			.get(&id)
			.await
			.expect("Lookup should succeed.")
			.expect("Conversation should exist.");

		assert_eq!(
			stored.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
			vec!["q0", "a0", "q1", "a1 again"]
		);
	}

	#[tokio::test]
	async fn regenerate_failure_uses_its_own_fallback() {
		let (session, _, _) = session(vec![Ok(GenerateResponse::new("a0"))]).await;
		let id = session.send(None, "q0").await.expect("Send should succeed.").conversation_id;
		let exchange = session
			.regenerate(&id, 1)
			.await
			.expect("Regenerate should succeed.")
			.expect("A user message precedes index 1.");

		assert_eq!(exchange.reply.content, REGENERATE_FALLBACK);
		assert_eq!(session.status(), ApiStatus::Error);
	}

	#[tokio::test]
	async fn using_a_conversation_makes_it_active_again() {
		let replies = (0..4).map(|i| Ok(GenerateResponse::new(format!("r{i}")))).collect();
		let (session, _, _) = session(replies).await;
		let used = session.send(None, "one").await.expect("Send should succeed.").conversation_id;
		let newer = session.history().create().await.expect("Create should succeed.");

		assert_eq!(session.restore().await.expect("Load should succeed.").active, Some(newer.id));

		session.send(Some(&used), "again").await.expect("Send should succeed.");

		assert_eq!(
			session.restore().await.expect("Load should succeed.").active,
			Some(used.clone())
		);

		let other = session.history().create().await.expect("Create should succeed.");

		assert_eq!(
			session.history().active().await.expect("Lookup should succeed."),
			Some(other.id)
		);

		session.regenerate(&used, 3).await.expect("Regenerate should succeed.");

		assert_eq!(session.history().active().await.expect("Lookup should succeed."), Some(used));
	}

	#[tokio::test]
	async fn toggle_bookmark_announces_state() {
		let (session, _, sink) = session(vec![Ok(GenerateResponse::new("a0"))]).await;
		let id = session.send(None, "q0").await.expect("Send should succeed.").conversation_id;

		assert!(session.toggle_bookmark(&id, 1).await.expect("Toggle should succeed."));
		assert!(!session.toggle_bookmark(&id, 1).await.expect("Toggle should succeed."));
		assert!(matches!(
			session.toggle_bookmark(&id, 5).await,
			Err(Error::MessageNotFound { index: 5, .. })
		));
		assert_eq!(
			sink.messages(),
			vec!["Message bookmarked".to_owned(), "Bookmark removed".into()]
		);
		assert!(sink.snapshot().iter().all(|n| n.level == NotificationLevel::Success));
	}

	#[tokio::test]
	async fn unreadable_history_is_announced() {
		let (store, backend) = memory_store();
		let (sequencer, sink) = instant_sequencer();
		let client = Arc::new(ScriptedClient::default());
		let session = ChatSession::open(store, client, sequencer, sink.clone())
			.await
			.expect("Session should open.");

		backend.set(CONVERSATIONS_KEY, "not json".into()).await.expect("Set should succeed.");

		assert!(matches!(session.restore().await, Err(Error::Storage(_))));
		assert_eq!(
			sink.snapshot(),
			vec![Notification::error("Could not load saved conversations")]
		);
	}

	#[tokio::test]
	async fn theme_rename_and_clear_notify_and_persist() {
		let (store, backend) = memory_store();
		let (sequencer, sink) = instant_sequencer();
		let client = Arc::new(ScriptedClient::default());
		let session = ChatSession::open(store, client, sequencer, sink.clone())
			.await
			.expect("Session should open.");

		assert_eq!(session.toggle_theme().await.expect("Toggle should succeed."), Theme::Light);
		assert_eq!(
			backend.get(THEME_KEY).await.expect("Get should succeed."),
			Some("light".into())
		);

		let conversation = session.history().create().await.expect("Create should succeed.");

		session.rename(&conversation.id, "Notes").await.expect("Rename should succeed.");
		session.clear_all().await.expect("Clear should succeed.");

		assert_eq!(
			sink.messages(),
			vec!["Title updated".to_owned(), "All conversations cleared".into()]
		);
		assert!(session.history().list().await.expect("List should succeed.").is_empty());
		assert!(matches!(
			session.update_settings(ChatSettings { max_tokens: 0, ..Default::default() }).await,
			Err(Error::Config(_))
		));
	}
}
