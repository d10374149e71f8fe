//! Client-side chat state: an ordered transcript mirrored into a [`TranscriptStore`]
//! and a [`ChatProxy`] that produces assistant replies.
//!
//! Sends are not queued. Each reply is appended when its own proxy call resolves, so
//! concurrent sends can interleave replies out of send order.

pub mod console;
pub mod proxy;
pub mod redis;
pub mod store;

use std::sync::Arc;
use tokio::sync::Mutex;
use log::{ debug, error, warn };

use crate::models::chat::ChatMessage;
use self::proxy::ChatProxy;
use self::store::{ TranscriptStore, STORAGE_KEY };

pub const GREETING: &str = "Hi, how can I assist you today?";
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

pub fn seed_transcript() -> Vec<ChatMessage> {
    vec![ChatMessage::assistant(GREETING)]
}

#[derive(Debug, Default)]
struct WidgetState {
    transcript: Vec<ChatMessage>,
    input: String,
    in_flight: usize,
}

pub struct ChatWidget {
    state: Mutex<WidgetState>,
    store: Arc<dyn TranscriptStore>,
    proxy: Arc<dyn ChatProxy>,
}

impl ChatWidget {
    /// Restores the persisted transcript, falling back to the seed greeting.
    pub async fn initialize(store: Arc<dyn TranscriptStore>, proxy: Arc<dyn ChatProxy>) -> Self {
        let transcript = load_transcript(store.as_ref()).await.unwrap_or_else(seed_transcript);
        Self {
            state: Mutex::new(WidgetState { transcript, ..WidgetState::default() }),
            store,
            proxy,
        }
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn input(&self) -> String {
        self.state.lock().await.input.clone()
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        self.state.lock().await.input = text.into();
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.in_flight > 0
    }

    /// Sends the current input. Returns `false` without touching anything when the
    /// trimmed input is empty.
    ///
    /// The proxy receives the transcript as it was before the user turn was appended;
    /// the question itself travels separately as `message`.
    pub async fn send(&self) -> bool {
        let (message, history) = {
            let mut state = self.state.lock().await;
            let message = state.input.trim().to_string();
            if message.is_empty() {
                return false;
            }

            let history = state.transcript.clone();
            state.transcript.push(ChatMessage::user(message.clone()));
            state.input.clear();
            state.in_flight += 1;
            self.persist(&state.transcript).await;
            (message, history)
        };

        let reply = match self.proxy.ask(&message, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Chat proxy call failed: {}", e);
                ERROR_REPLY.to_string()
            }
        };

        let mut state = self.state.lock().await;
        state.transcript.push(ChatMessage::assistant(reply));
        state.in_flight = state.in_flight.saturating_sub(1);
        self.persist(&state.transcript).await;
        true
    }

    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.set_input(text).await;
        self.send().await
    }

    /// Resets to the seed greeting and overwrites storage with it.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.transcript = seed_transcript();
        self.persist(&state.transcript).await;
    }

    // Called with the state lock held so the stored copy is always the latest one.
    async fn persist(&self, transcript: &[ChatMessage]) {
        if transcript.is_empty() {
            return;
        }
        let serialized = match serde_json::to_string(transcript) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize chat history: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set_item(STORAGE_KEY, &serialized).await {
            error!("Failed to save chat history: {}", e);
        }
    }
}

async fn load_transcript(store: &dyn TranscriptStore) -> Option<Vec<ChatMessage>> {
    let saved = match store.get_item(STORAGE_KEY).await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            debug!("No saved chat history, starting fresh");
            return None;
        }
        Err(e) => {
            error!("Failed to load chat history: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<Vec<ChatMessage>>(&saved) {
        Ok(transcript) if !transcript.is_empty() => Some(transcript),
        Ok(_) => None,
        Err(e) => {
            warn!("Discarding unreadable chat history: {}", e);
            None
        }
    }
}
