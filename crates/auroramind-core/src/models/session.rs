//! Chat session models for the streaming gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Role of a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Single chat message in a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(session_id: &str, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(session_id: &str, content: impl Into<String>) -> Self {
        Self::new(session_id, ChatRole::User, content)
    }

    pub fn assistant(session_id: &str, content: impl Into<String>) -> Self {
        Self::new(session_id, ChatRole::Assistant, content)
    }
}

/// A conversation thread. Messages are held separately by the session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    /// Default knowledge base; may be empty or point at a collection that no
    /// longer exists.
    pub default_kb_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(title: impl Into<String>, default_kb_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let title = title.into();
        let title = if title.trim().is_empty() {
            DEFAULT_SESSION_TITLE.to_string()
        } else {
            title
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            default_kb_id: default_kb_id.into(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Knowledge base a message should run against: the explicit request
    /// value when given, otherwise the session default.
    pub fn effective_kb_id(&self, requested: Option<&str>) -> String {
        match requested {
            Some(kb_id) if !kb_id.trim().is_empty() => kb_id.to_string(),
            _ => self.default_kb_id.clone(),
        }
    }
}
