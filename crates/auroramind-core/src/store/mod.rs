//! Session store
//!
//! A single owner task holds every session, message, and in-memory document.
//! Callers talk to it through a cloneable [`SessionStore`] handle that sends
//! commands over an mpsc channel and waits on a oneshot reply. No caller can
//! hold the state across an await point, so no lock is ever held during I/O.

mod state;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{ChatMessage, ChatSession, Document};
use state::StoreState;

const COMMAND_QUEUE_DEPTH: usize = 256;

pub(crate) enum StoreCommand {
    CreateSession {
        session: ChatSession,
        reply: oneshot::Sender<ChatSession>,
    },
    ListSessions {
        reply: oneshot::Sender<Vec<ChatSession>>,
    },
    GetSession {
        id: String,
        reply: oneshot::Sender<Option<ChatSession>>,
    },
    AppendMessage {
        message: ChatMessage,
        reply: oneshot::Sender<Result<ChatSession, StoreError>>,
    },
    ListMessages {
        session_id: String,
        reply: oneshot::Sender<Result<Vec<ChatMessage>, StoreError>>,
    },
    PutDocument {
        document: Document,
        reply: oneshot::Sender<()>,
    },
    ListDocuments {
        collection_id: String,
        reply: oneshot::Sender<Vec<Document>>,
    },
    DeleteDocument {
        collection_id: String,
        document_id: String,
        reply: oneshot::Sender<Option<Document>>,
    },
}

/// Handle to the session store task
#[derive(Debug, Clone)]
pub struct SessionStore {
    command_tx: mpsc::Sender<StoreCommand>,
}

impl SessionStore {
    /// Start the store task. It runs until every handle has been dropped.
    pub fn spawn() -> Self {
        let (command_tx, mut command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        tokio::spawn(async move {
            let mut state = StoreState::default();
            while let Some(command) = command_rx.recv().await {
                state.apply(command);
            }
            debug!("Session store stopped");
        });

        Self { command_tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::Closed)?;
        reply_rx.await.map_err(|_| StoreError::Closed)
    }

    /// Register a new session with a fresh id. Blank titles become "New Chat".
    pub async fn create_session(
        &self,
        title: impl Into<String>,
        default_kb_id: impl Into<String>,
    ) -> Result<ChatSession, StoreError> {
        let session = ChatSession::new(title, default_kb_id);
        self.request(|reply| StoreCommand::CreateSession { session, reply })
            .await
    }

    /// Point-in-time snapshot of all sessions, in no particular order.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, StoreError> {
        self.request(|reply| StoreCommand::ListSessions { reply })
            .await
    }

    pub async fn get_session(&self, id: &str) -> Result<ChatSession, StoreError> {
        let id = id.to_string();
        self.request(|reply| StoreCommand::GetSession {
            id: id.clone(),
            reply,
        })
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    /// Append a message to its session and update the session's last
    /// activity in the same step. Returns the updated session.
    pub async fn append_message(&self, message: ChatMessage) -> Result<ChatSession, StoreError> {
        self.request(|reply| StoreCommand::AppendMessage { message, reply })
            .await?
    }

    /// Message history of a session, in insertion order.
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let session_id = session_id.to_string();
        self.request(|reply| StoreCommand::ListMessages { session_id, reply })
            .await?
    }

    pub async fn put_document(&self, document: Document) -> Result<(), StoreError> {
        self.request(|reply| StoreCommand::PutDocument { document, reply })
            .await
    }

    pub async fn list_documents(&self, collection_id: &str) -> Result<Vec<Document>, StoreError> {
        let collection_id = collection_id.to_string();
        self.request(|reply| StoreCommand::ListDocuments {
            collection_id,
            reply,
        })
        .await
    }

    /// Remove a document from a collection, returning it when it existed.
    pub async fn delete_document(
        &self,
        collection_id: &str,
        document_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let collection_id = collection_id.to_string();
        let document_id = document_id.to_string();
        self.request(|reply| StoreCommand::DeleteDocument {
            collection_id,
            document_id,
            reply,
        })
        .await
    }
}
