//! On-disk storage for uploaded files.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{DocumentError, DocumentResult};

/// Replace spaces with `_` and any character outside `[A-Za-z0-9._-]` with `-`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' => '_',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '-',
        })
        .collect()
}

/// Writes uploads to `<root>/<collection_id>/<document_id>_<sanitized name>`.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection_id: &str) -> DocumentResult<PathBuf> {
        let dir_name = sanitize_file_name(collection_id);
        if dir_name.is_empty() || dir_name.chars().all(|c| c == '.') {
            return Err(DocumentError::Storage(format!(
                "invalid collection id '{}'",
                collection_id
            )));
        }
        Ok(self.root.join(dir_name))
    }

    /// Write the file and return its absolute path, which becomes the
    /// document's storage locator. A partially written file is removed.
    pub async fn store(
        &self,
        collection_id: &str,
        document_id: &str,
        file_name: &str,
        contents: &[u8],
    ) -> DocumentResult<String> {
        let dir = self.collection_dir(collection_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DocumentError::Storage(format!("cannot create storage path: {}", e)))?;

        let path = dir.join(format!("{}_{}", document_id, sanitize_file_name(file_name)));
        let path = std::path::absolute(&path)
            .map_err(|e| DocumentError::Storage(format!("cannot resolve storage path: {}", e)))?;

        if let Err(e) = write_file(&path, contents).await {
            self.remove(&path.to_string_lossy()).await;
            return Err(DocumentError::Storage(format!("cannot store file: {}", e)));
        }

        Ok(path.to_string_lossy().into_owned())
    }

    /// Best-effort removal; failures are logged and otherwise ignored.
    pub async fn remove(&self, storage_uri: &str) {
        if storage_uri.is_empty() {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(storage_uri).await {
            debug!(storage_uri, error = %e, "Could not remove stored file");
        }
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My Notes.txt"), "My_Notes.txt");
        assert_eq!(sanitize_file_name("a/b\\c?.pdf"), "a-b-c-.pdf");
        assert_eq!(sanitize_file_name("résumé-v2_final.doc"), "r-sum--v2_final.doc");
    }

    #[tokio::test]
    async fn test_store_writes_under_collection() {
        let temp_dir = tempdir().unwrap();
        let uploads = UploadStorage::new(temp_dir.path());

        let uri = uploads
            .store("kb-default", "doc-1", "My Notes.txt", b"hello")
            .await
            .unwrap();

        let path = Path::new(&uri);
        assert!(path.is_absolute());
        assert!(uri.ends_with("doc-1_My_Notes.txt"));
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "kb-default");
        assert_eq!(std::fs::read(path).unwrap(), b"hello");

        uploads.remove(&uri).await;
        assert!(!path.exists());
        uploads.remove(&uri).await;
    }

    #[tokio::test]
    async fn test_store_rejects_dot_collection() {
        let temp_dir = tempdir().unwrap();
        let uploads = UploadStorage::new(temp_dir.path());

        let err = uploads.store("..", "doc-1", "a.txt", b"x").await.unwrap_err();
        assert!(matches!(err, DocumentError::Storage(_)));
    }

    #[tokio::test]
    async fn test_store_fails_when_root_is_a_file() {
        let temp_dir = tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let uploads = UploadStorage::new(&blocker);

        let err = uploads.store("kb", "doc-1", "a.txt", b"x").await.unwrap_err();
        assert!(matches!(err, DocumentError::Storage(_)));
    }
}
