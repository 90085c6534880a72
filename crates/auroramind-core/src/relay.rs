//! Streaming relay
//!
//! One relay run per chat request:
//!
//! ```text
//! Init -> PersistingUserMessage -> Streaming -> PersistingAssistantMessage -> Done
//!                                      |
//!                                      +-> Aborted (assistant message still persisted)
//! ```
//!
//! [`StreamingRelay::begin`] covers validation and the user message; the
//! returned [`PreparedStream`] runs the rest. The producer and the relay are
//! joined by a channel holding one fragment, so a slow client slows the
//! producer instead of growing a buffer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::RelayError;
use crate::models::{ChatMessage, ChatSession};
use crate::store::SessionStore;
use crate::upstream::{StreamOutcome, TokenRequest, TokenSource};

/// Fragments in flight between the producer and the relay
const TOKEN_CHANNEL_CAPACITY: usize = 1;

/// Events delivered to the client transport, in order
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Token(String),
    Done(DoneSummary),
}

/// Payload of the terminal `done` event
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DoneSummary {
    pub message_id: String,
    pub session_id: String,
    pub kb_id: String,
    /// Rough token count: content bytes / 4
    pub tokens: usize,
    /// Set when the answer is the placeholder stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Init,
    PersistingUserMessage,
    Streaming,
    PersistingAssistantMessage,
    Done,
    Aborted,
}

/// Inbound chat message
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub session_id: String,
    pub content: String,
    /// Overrides the session's default knowledge base when non-blank
    pub kb_id: Option<String>,
}

/// What a finished relay run did
#[derive(Debug, Clone)]
pub struct RelayReport {
    /// `Done` or `Aborted`
    pub phase: RelayPhase,
    pub assistant_message: ChatMessage,
    pub outcome: StreamOutcome,
}

/// Collapse line breaks so a fragment fits on one SSE `data:` line.
pub fn escape_fragment(fragment: &str) -> String {
    fragment.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn approximate_tokens(content: &str) -> usize {
    content.len() / 4
}

#[derive(Clone)]
pub struct StreamingRelay {
    store: SessionStore,
    source: Arc<dyn TokenSource>,
}

impl StreamingRelay {
    pub fn new(store: SessionStore, source: Arc<dyn TokenSource>) -> Self {
        Self { store, source }
    }

    /// Validate the request and persist the user message. Nothing is written
    /// when this fails.
    pub async fn begin(&self, request: StreamRequest) -> Result<PreparedStream, RelayError> {
        let session = self.store.get_session(&request.session_id).await?;
        if request.content.trim().is_empty() {
            return Err(RelayError::BlankContent);
        }
        debug!(session_id = %session.id, phase = ?RelayPhase::PersistingUserMessage, "Relay phase");

        let session = self
            .store
            .append_message(ChatMessage::user(&session.id, request.content.clone()))
            .await?;
        let kb_id = session.effective_kb_id(request.kb_id.as_deref());

        Ok(PreparedStream {
            store: self.store.clone(),
            source: self.source.clone(),
            session,
            kb_id,
            prompt: request.content,
        })
    }
}

/// A validated request whose user message is already stored
pub struct PreparedStream {
    store: SessionStore,
    source: Arc<dyn TokenSource>,
    session: ChatSession,
    kb_id: String,
    prompt: String,
}

impl PreparedStream {
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn kb_id(&self) -> &str {
        &self.kb_id
    }

    /// Stream tokens into `events`, then persist the assistant message and
    /// emit `done`. Dropping the receiving side of `events` or cancelling
    /// `cancel` aborts the stream; whatever was already emitted is still
    /// persisted.
    pub async fn run(
        self,
        events: mpsc::Sender<RelayEvent>,
        cancel: CancellationToken,
    ) -> RelayReport {
        let session_id = self.session.id.clone();
        debug!(session_id = %session_id, phase = ?RelayPhase::Streaming, "Relay phase");

        let (token_tx, mut token_rx) = mpsc::channel::<String>(TOKEN_CHANNEL_CAPACITY);
        let producer_cancel = cancel.child_token();
        let producer = {
            let source = self.source.clone();
            let request = TokenRequest {
                prompt: self.prompt.clone(),
                session_id: session_id.clone(),
                kb_id: self.kb_id.clone(),
            };
            let producer_cancel = producer_cancel.clone();
            tokio::spawn(async move {
                source
                    .stream_tokens(request, token_tx, producer_cancel)
                    .await
            })
        };

        let mut content = String::new();
        let mut aborted = false;

        loop {
            let fragment = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    aborted = true;
                    break;
                }
                _ = events.closed() => {
                    aborted = true;
                    break;
                }
                fragment = token_rx.recv() => fragment,
            };

            let Some(fragment) = fragment else { break };
            if fragment.is_empty() {
                continue;
            }

            let payload = escape_fragment(&fragment);
            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                sent = events.send(RelayEvent::Token(payload.clone())) => sent.is_ok(),
            };
            if !delivered {
                aborted = true;
                break;
            }
            content.push_str(&payload);
        }

        if aborted {
            info!(session_id = %session_id, emitted_bytes = content.len(), "Client went away, aborting stream");
            producer_cancel.cancel();
        }
        drop(token_rx);

        let outcome = match producer.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Token producer failed");
                StreamOutcome::Degraded(format!("token producer failed: {}", e))
            }
        };

        debug!(session_id = %session_id, phase = ?RelayPhase::PersistingAssistantMessage, "Relay phase");
        let assistant_message = ChatMessage::assistant(&session_id, content);
        if let Err(e) = self.store.append_message(assistant_message.clone()).await {
            error!(session_id = %session_id, error = %e, "Failed to persist assistant message");
        }

        let mut phase = if aborted {
            RelayPhase::Aborted
        } else {
            RelayPhase::Done
        };

        if phase == RelayPhase::Done {
            let summary = DoneSummary {
                message_id: assistant_message.id.clone(),
                session_id: session_id.clone(),
                kb_id: self.kb_id.clone(),
                tokens: approximate_tokens(&assistant_message.content),
                degraded: outcome.degradation_reason().map(str::to_string),
            };
            if events.send(RelayEvent::Done(summary)).await.is_err() {
                phase = RelayPhase::Aborted;
            }
        }
        debug!(session_id = %session_id, phase = ?phase, "Relay finished");

        RelayReport {
            phase,
            assistant_message,
            outcome,
        }
    }
}
