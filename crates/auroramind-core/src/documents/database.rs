use async_trait::async_trait;
use auroramind_storage::DocumentStorage;

use super::DocumentRepository;
use crate::error::{DocumentError, DocumentResult};
use crate::models::Document;

/// Typed wrapper around the byte-level redb document table.
#[derive(Debug, Clone)]
pub struct RedbDocumentRepository {
    storage: DocumentStorage,
}

impl RedbDocumentRepository {
    pub fn new(storage: DocumentStorage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl DocumentRepository for RedbDocumentRepository {
    fn backend(&self) -> &'static str {
        "redb"
    }

    async fn put(&self, document: Document) -> DocumentResult<()> {
        let data = serde_json::to_vec(&document)?;
        self.storage
            .put_raw(&document.id, &document.collection_id, &data)?;
        Ok(())
    }

    /// Newest upload first.
    async fn list(&self, collection_id: &str) -> DocumentResult<Vec<Document>> {
        let mut documents = self
            .storage
            .list_by_collection_raw(collection_id)?
            .into_iter()
            .map(|(_, data)| serde_json::from_slice::<Document>(&data))
            .collect::<Result<Vec<_>, _>>()?;
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn delete(&self, collection_id: &str, document_id: &str) -> DocumentResult<Document> {
        let data = self
            .storage
            .get_in_collection_raw(collection_id, document_id)?
            .ok_or_else(|| DocumentError::NotFound(document_id.to_string()))?;
        let document: Document = serde_json::from_slice(&data)?;

        if !self.storage.delete(collection_id, document_id)? {
            return Err(DocumentError::NotFound(document_id.to_string()));
        }
        Ok(document)
    }
}
