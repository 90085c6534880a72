use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion status. Only `Uploaded` is set by the gateway; the others are
/// written by the ingestion pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Uploaded,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub title: String,
    pub storage_uri: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub status_message: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn uploaded(
        id: impl Into<String>,
        collection_id: impl Into<String>,
        title: impl Into<String>,
        storage_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            collection_id: collection_id.into(),
            title: title.into(),
            storage_uri: storage_uri.into(),
            status: DocumentStatus::Uploaded,
            status_message: String::new(),
            uploaded_at: Utc::now(),
        }
    }
}
