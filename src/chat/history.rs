//! Conversation history persisted through a [`KeyValueStore`].
//!
//! The history is stored as a single JSON array under [`CONVERSATIONS_KEY`] (newest first) plus
//! the last opened identifier under [`LAST_ACTIVE_KEY`], the same layout browser clients keep in
//! local storage. Every mutation is a read-modify-write of that array, so mutations are serialized
//! through an async mutex shared by all clones of a [`ChatHistory`].

// self
use crate::{
	_prelude::*,
	chat::{Conversation, ConversationId, Message},
	store::{CONVERSATIONS_KEY, KeyValueStore, LAST_ACTIVE_KEY, StoreError},
};

/// Conversations plus the restored active conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistorySnapshot {
	/// Saved conversations, newest first.
	pub conversations: Vec<Conversation>,
	/// Last active conversation, only when it still exists.
	pub active: Option<ConversationId>,
}
impl HistorySnapshot {
	/// Returns the active conversation, if any.
	pub fn active_conversation(&self) -> Option<&Conversation> {
		let active = self.active.as_ref()?;

		self.conversations.iter().find(|conversation| &conversation.id == active)
	}
}

/// Repository of saved conversations.
#[derive(Clone)]
pub struct ChatHistory {
	store: Arc<dyn KeyValueStore>,
	write_guard: Arc<AsyncMutex<()>>,
}
impl ChatHistory {
	/// Wraps the provided store.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store, write_guard: Default::default() }
	}

	/// Loads every conversation and restores the active one when it still exists.
	pub async fn load(&self) -> Result<HistorySnapshot> {
		let conversations = self.read_conversations().await?;
		let active = self
			.read_active()
			.await?
			.filter(|active| conversations.iter().any(|conversation| &conversation.id == active));

		Ok(HistorySnapshot { conversations, active })
	}

	/// Lists saved conversations, newest first.
	pub async fn list(&self) -> Result<Vec<Conversation>> {
		self.read_conversations().await
	}

	/// Fetches a conversation by identifier.
	pub async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>> {
		Ok(self.read_conversations().await?.into_iter().find(|conversation| &conversation.id == id))
	}

	/// Identifier of the last opened conversation, if it was recorded.
	pub async fn active(&self) -> Result<Option<ConversationId>> {
		self.read_active().await
	}

	/// Creates an empty conversation, stores it first in the list, and marks it active.
	pub async fn create(&self) -> Result<Conversation> {
		let _guard = self.write_guard.lock().await;
		let mut conversations = self.read_conversations().await?;
		let now = OffsetDateTime::now_utc();
		let mut millis = now.unix_timestamp_nanos() / 1_000_000;

		while conversations.iter().any(|conversation| *conversation.id == millis.to_string()) {
			millis += 1;
		}

		let conversation = Conversation::new(ConversationId::from_millis(millis), now);

		conversations.insert(0, conversation.clone());
		self.write_conversations(&conversations).await?;
		self.store.set(LAST_ACTIVE_KEY, conversation.id.to_string()).await?;

		Ok(conversation)
	}

	/// Marks `id` as the active conversation and returns it.
	pub async fn select(&self, id: &ConversationId) -> Result<Conversation> {
		let _guard = self.write_guard.lock().await;
		let conversation = self
			.read_conversations()
			.await?
			.into_iter()
			.find(|conversation| &conversation.id == id)
			.ok_or_else(|| not_found(id))?;

		self.store.set(LAST_ACTIVE_KEY, id.to_string()).await?;

		Ok(conversation)
	}

	/// Deletes a conversation, clearing the active marker when it pointed at it.
	///
	/// Returns `false` when no conversation matched.
	pub async fn delete(&self, id: &ConversationId) -> Result<bool> {
		let _guard = self.write_guard.lock().await;
		let mut conversations = self.read_conversations().await?;
		let before = conversations.len();

		conversations.retain(|conversation| &conversation.id != id);

		if conversations.len() == before {
			return Ok(false);
		}

		self.write_conversations(&conversations).await?;

		if self.read_active().await?.as_ref() == Some(id) {
			self.store.remove(LAST_ACTIVE_KEY).await?;
		}

		Ok(true)
	}

	/// Removes every conversation and the active marker.
	pub async fn clear(&self) -> Result<()> {
		let _guard = self.write_guard.lock().await;

		self.store.remove(CONVERSATIONS_KEY).await?;
		self.store.remove(LAST_ACTIVE_KEY).await?;

		Ok(())
	}

	/// Renames a conversation; the title is trimmed and must not be empty.
	pub async fn rename(&self, id: &ConversationId, title: &str) -> Result<Conversation> {
		let title = title.trim();

		if title.is_empty() {
			return Err(Error::EmptyTitle);
		}

		self.update(id, |conversation| {
			conversation.title = title.to_owned();

			Ok(conversation.clone())
		})
		.await
	}

	/// Appends messages to a conversation and returns the updated conversation.
	pub async fn append(
		&self,
		id: &ConversationId,
		messages: impl IntoIterator<Item = Message>,
	) -> Result<Conversation> {
		let messages = messages.into_iter().collect::<Vec<_>>();

		self.update(id, move |conversation| {
			conversation.messages.extend(messages);

			Ok(conversation.clone())
		})
		.await
	}

	/// Keeps only the first `len` messages of a conversation.
	pub async fn truncate(&self, id: &ConversationId, len: usize) -> Result<Conversation> {
		self.update(id, |conversation| {
			conversation.messages.truncate(len);

			Ok(conversation.clone())
		})
		.await
	}

	/// Flips the bookmark flag of a message and returns the new state.
	pub async fn toggle_bookmark(&self, id: &ConversationId, index: usize) -> Result<bool> {
		self.update(id, |conversation| {
			let message = conversation
				.messages
				.get_mut(index)
				.ok_or_else(|| Error::MessageNotFound { id: id.to_string(), index })?;

			message.bookmarked = !message.bookmarked;

			Ok(message.bookmarked)
		})
		.await
	}

	async fn update<R>(
		&self,
		id: &ConversationId,
		apply: impl FnOnce(&mut Conversation) -> Result<R>,
	) -> Result<R> {
		let _guard = self.write_guard.lock().await;
		let mut conversations = self.read_conversations().await?;
		let conversation = conversations
			.iter_mut()
			.find(|conversation| &conversation.id == id)
			.ok_or_else(|| not_found(id))?;
		let output = apply(conversation)?;

		self.write_conversations(&conversations).await?;

		Ok(output)
	}

	async fn read_conversations(&self) -> Result<Vec<Conversation>> {
		let Some(raw) = self.store.get(CONVERSATIONS_KEY).await? else {
			return Ok(Vec::new());
		};
		let mut deserializer = serde_json::Deserializer::from_str(&raw);
		let conversations = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			StoreError::Serialization {
				message: format!("Saved conversations are unreadable at `{}`: {}", e.path(), e.inner()),
			}
		})?;

		Ok(conversations)
	}

	async fn write_conversations(&self, conversations: &[Conversation]) -> Result<()> {
		let raw = serde_json::to_string(conversations).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize conversations: {e}"),
		})?;

		self.store.set(CONVERSATIONS_KEY, raw).await?;

		Ok(())
	}

	async fn read_active(&self) -> Result<Option<ConversationId>> {
		// A malformed marker is treated as "nothing selected".
		Ok(self.store.get(LAST_ACTIVE_KEY).await?.and_then(|raw| ConversationId::new(raw).ok()))
	}
}
impl Debug for ChatHistory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ChatHistory(..)")
	}
}

fn not_found(id: &ConversationId) -> Error {
	Error::ConversationNotFound { id: id.to_string() }
}
