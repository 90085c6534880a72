//! AuroraMind Storage - Low-level storage layer for the chat gateway
//!
//! Uses redb as the embedded database and exposes byte-level APIs so the
//! typed models can live in `auroramind-core` without a dependency cycle.
//!
//! # Tables
//!
//! - `documents` - Document records keyed by document id
//! - `document_collection_index` - `collection_id \0 document_id -> document_id`

pub mod document;

use anyhow::Result;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use document::DocumentStorage;

/// Central storage manager that opens the database and initializes its tables
pub struct Storage {
    pub documents: DocumentStorage,
}

impl Storage {
    /// Open (or create) the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let db = Arc::new(Database::create(path)?);
        let documents = DocumentStorage::new(db)?;
        tracing::debug!(path = %path.display(), "Opened document database");

        Ok(Self { documents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_creates_parent_directories() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("gateway.db");

        let storage = Storage::new(&db_path).unwrap();
        storage.documents.put_raw("doc-1", "kb-1", b"{}").unwrap();

        assert!(db_path.exists());
        assert!(storage.documents.get_in_collection_raw("kb-1", "doc-1").unwrap().is_some());
    }
}
