mod document;
mod session;

pub use document::{Document, DocumentStatus};
pub use session::{ChatMessage, ChatRole, ChatSession};
