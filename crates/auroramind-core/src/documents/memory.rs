use async_trait::async_trait;

use super::DocumentRepository;
use crate::error::{DocumentError, DocumentResult};
use crate::models::Document;
use crate::store::SessionStore;

/// Documents held by the session store task. Used when no database is
/// configured; contents live for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct MemoryDocumentRepository {
    store: SessionStore,
}

impl MemoryDocumentRepository {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, document: Document) -> DocumentResult<()> {
        Ok(self.store.put_document(document).await?)
    }

    async fn list(&self, collection_id: &str) -> DocumentResult<Vec<Document>> {
        Ok(self.store.list_documents(collection_id).await?)
    }

    async fn delete(&self, collection_id: &str, document_id: &str) -> DocumentResult<Document> {
        self.store
            .delete_document(collection_id, document_id)
            .await?
            .ok_or_else(|| DocumentError::NotFound(document_id.to_string()))
    }
}
