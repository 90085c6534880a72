//! State owned by the session store task.
//!
//! Nothing outside the store task holds a reference into this state; all
//! mutation happens through [`StoreState::apply`], one command at a time.

use std::collections::HashMap;

use chrono::Utc;

use super::StoreCommand;
use crate::error::StoreError;
use crate::models::{ChatMessage, ChatSession, Document};

#[derive(Debug, Default)]
pub(super) struct StoreState {
    sessions: HashMap<String, ChatSession>,
    messages: HashMap<String, Vec<ChatMessage>>,
    documents: HashMap<String, Vec<Document>>,
}

impl StoreState {
    pub(super) fn apply(&mut self, command: StoreCommand) {
        match command {
            StoreCommand::CreateSession { session, reply } => {
                let _ = reply.send(self.insert_session(session));
            }
            StoreCommand::ListSessions { reply } => {
                let _ = reply.send(self.sessions.values().cloned().collect());
            }
            StoreCommand::GetSession { id, reply } => {
                let _ = reply.send(self.sessions.get(&id).cloned());
            }
            StoreCommand::AppendMessage { message, reply } => {
                let _ = reply.send(self.append_message(message));
            }
            StoreCommand::ListMessages { session_id, reply } => {
                let _ = reply.send(self.list_messages(&session_id));
            }
            StoreCommand::PutDocument { document, reply } => {
                self.documents
                    .entry(document.collection_id.clone())
                    .or_default()
                    .push(document);
                let _ = reply.send(());
            }
            StoreCommand::ListDocuments {
                collection_id,
                reply,
            } => {
                let documents = self
                    .documents
                    .get(&collection_id)
                    .cloned()
                    .unwrap_or_default();
                let _ = reply.send(documents);
            }
            StoreCommand::DeleteDocument {
                collection_id,
                document_id,
                reply,
            } => {
                let _ = reply.send(self.delete_document(&collection_id, &document_id));
            }
        }
    }

    fn insert_session(&mut self, session: ChatSession) -> ChatSession {
        self.messages.entry(session.id.clone()).or_default();
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Append and bump last activity in the same step.
    fn append_message(&mut self, message: ChatMessage) -> Result<ChatSession, StoreError> {
        let session = self
            .sessions
            .get_mut(&message.session_id)
            .ok_or_else(|| StoreError::NotFound(message.session_id.clone()))?;

        session.last_activity = Utc::now().max(message.created_at);
        let updated = session.clone();
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
        Ok(updated)
    }

    fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        if !self.sessions.contains_key(session_id) {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(self.messages.get(session_id).cloned().unwrap_or_default())
    }

    fn delete_document(&mut self, collection_id: &str, document_id: &str) -> Option<Document> {
        let documents = self.documents.get_mut(collection_id)?;
        let index = documents.iter().position(|doc| doc.id == document_id)?;
        Some(documents.remove(index))
    }
}
