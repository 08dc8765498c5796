//! Sequential, rate-limit-aware relay for generative chat APIs.
//!
//! Requests flow through a FIFO [`sequencer::Sequencer`] that backs off on throttling, while
//! [`chat::ChatHistory`] keeps conversations in a pluggable key-value store.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod chat;
pub mod error;
pub mod model;
pub mod notify;
pub mod obs;
pub mod sequencer;
pub mod session;
pub mod settings;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		model::{GenerateFuture, GenerateRequest, GenerateResponse, GenerativeClient},
		notify::MemorySink,
		sequencer::{RetryPolicy, Sequencer, SequencerConfig},
		store::{KeyValueStore, MemoryStore},
	};

	/// Scripted reply returned by [`ScriptedClient`].
	pub type ScriptedReply = Result<GenerateResponse, crate::error::ApiError>;

	/// Generative client that replays a fixed script of replies and records every request.
	///
	/// Once the script runs dry the client answers with an `invalid argument` rejection.
	#[derive(Debug, Default)]
	pub struct ScriptedClient {
		replies: Mutex<VecDeque<ScriptedReply>>,
		requests: Mutex<Vec<GenerateRequest>>,
	}
	impl ScriptedClient {
		/// Creates a client that answers with `replies` in order.
		pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
			Self { replies: Mutex::new(replies.into_iter().collect()), requests: Default::default() }
		}

		/// Returns a copy of every request observed so far.
		pub fn requests(&self) -> Vec<GenerateRequest> {
			self.requests.lock().clone()
		}
	}
	impl GenerativeClient for ScriptedClient {
		fn generate(&self, request: GenerateRequest) -> GenerateFuture<'_> {
			self.requests.lock().push(request);

			let reply = self.replies.lock().pop_front().unwrap_or_else(|| {
				Err(crate::error::ApiError::rejected("invalid argument: script exhausted", None))
			});

			Box::pin(async move { reply })
		}
	}

	/// Builds a sequencer with zero cooldown/backoff timings plus the sink it reports to.
	pub fn instant_sequencer() -> (Sequencer, Arc<MemorySink>) {
		let sink = Arc::new(MemorySink::default());
		let config = SequencerConfig {
			cooldown: Duration::ZERO,
			retry: RetryPolicy { initial_backoff: Duration::from_millis(1), ..Default::default() },
		};

		let sequencer = Sequencer::spawn(config, sink.clone())
			.expect("Instant sequencer configuration should be valid.");

		(sequencer, sink)
	}

	/// Returns an empty in-memory store behind the trait object used by chat components.
	pub fn memory_store() -> (Arc<dyn KeyValueStore>, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn KeyValueStore> = backend.clone();

		(store, backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
