//! Document repository capability and upload file storage.
//!
//! The gateway picks one repository variant at startup: redb when a database
//! path is configured, otherwise the session store's in-memory map. Nothing
//! else in the system knows which one is active.

mod database;
mod files;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DocumentResult;
use crate::models::Document;
use crate::store::SessionStore;

pub use database::RedbDocumentRepository;
pub use files::{UploadStorage, sanitize_file_name};
pub use memory::MemoryDocumentRepository;

/// Persistence for document records
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Backend name, used in logs
    fn backend(&self) -> &'static str;

    async fn put(&self, document: Document) -> DocumentResult<()>;

    async fn list(&self, collection_id: &str) -> DocumentResult<Vec<Document>>;

    /// Remove a document and return the removed record. Fails with
    /// `NotFound` when the collection has no such document.
    async fn delete(&self, collection_id: &str, document_id: &str) -> DocumentResult<Document>;
}

/// Select the repository variant from configuration.
pub fn open_repository(
    database_path: Option<&str>,
    store: &SessionStore,
) -> anyhow::Result<Arc<dyn DocumentRepository>> {
    match database_path {
        Some(path) => {
            let storage = auroramind_storage::Storage::new(path)?;
            Ok(Arc::new(RedbDocumentRepository::new(storage.documents)))
        }
        None => Ok(Arc::new(MemoryDocumentRepository::new(store.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_repository_selects_backend() {
        let store = SessionStore::spawn();
        let memory = open_repository(None, &store).unwrap();
        assert_eq!(memory.backend(), "memory");

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("docs.db");
        let persistent = open_repository(path.to_str(), &store).unwrap();
        assert_eq!(persistent.backend(), "redb");
    }
}
