//! Document intake notifier
//!
//! After an upload is recorded the ingestion service is told about it from a
//! detached task. The upload request never waits for it; failures travel on
//! their own channel to a task whose only job is to log them.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::models::Document;
use crate::upstream::SERVICE_TOKEN_HEADER;

const INGEST_PATH: &str = "/internal/ingest";

/// Body of the ingestion notification
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestNotice {
    pub document_id: String,
    pub collection_id: String,
    pub storage_uri: String,
    pub title: String,
}

impl From<&Document> for IngestNotice {
    fn from(document: &Document) -> Self {
        Self {
            document_id: document.id.clone(),
            collection_id: document.collection_id.clone(),
            storage_uri: document.storage_uri.clone(),
            title: document.title.clone(),
        }
    }
}

#[async_trait]
pub trait IngestNotifier: Send + Sync {
    async fn notify(&self, notice: &IngestNotice) -> Result<(), NotifyError>;
}

/// Posts notices to the AI service's ingest endpoint
pub struct HttpIngestNotifier {
    client: Client,
    endpoint: Option<String>,
    service_token: Option<String>,
}

impl HttpIngestNotifier {
    /// With no base URL every notice is dropped after a debug log.
    pub fn new(client: Client, base_url: Option<&str>, service_token: Option<String>) -> Self {
        Self {
            client,
            endpoint: base_url.map(|url| format!("{}{}", url.trim_end_matches('/'), INGEST_PATH)),
            service_token,
        }
    }
}

#[async_trait]
impl IngestNotifier for HttpIngestNotifier {
    async fn notify(&self, notice: &IngestNotice) -> Result<(), NotifyError> {
        let Some(endpoint) = &self.endpoint else {
            debug!(document_id = %notice.document_id, "No ingestion service configured");
            return Ok(());
        };

        let mut builder = self.client.post(endpoint).json(notice);
        if let Some(token) = &self.service_token {
            builder = builder.header(SERVICE_TOKEN_HEADER, token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.as_u16() >= 300 {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// A notification that did not go through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyFailure {
    pub document_id: String,
    pub reason: String,
}

/// Spawns one detached notification task per stored document.
#[derive(Clone)]
pub struct IngestDispatcher {
    notifier: Arc<dyn IngestNotifier>,
    failures: mpsc::UnboundedSender<NotifyFailure>,
}

impl IngestDispatcher {
    /// Create a dispatcher whose failures are logged by a background task.
    pub fn spawn(notifier: Arc<dyn IngestNotifier>) -> Self {
        let (dispatcher, mut failures) = Self::with_failure_channel(notifier);
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                warn!(
                    document_id = %failure.document_id,
                    reason = %failure.reason,
                    "Ingest notification failed"
                );
            }
        });
        dispatcher
    }

    /// Create a dispatcher and hand back the receiving end of its failure
    /// channel.
    pub fn with_failure_channel(
        notifier: Arc<dyn IngestNotifier>,
    ) -> (Self, mpsc::UnboundedReceiver<NotifyFailure>) {
        let (failures, failures_rx) = mpsc::unbounded_channel();
        (
            Self {
                notifier,
                failures,
            },
            failures_rx,
        )
    }

    /// Notify about `document` in the background. Callers normally drop the
    /// handle.
    pub fn dispatch(&self, document: &Document) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        let failures = self.failures.clone();
        let notice = IngestNotice::from(document);

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notice).await {
                let _ = failures.send(NotifyFailure {
                    document_id: notice.document_id,
                    reason: e.to_string(),
                });
            }
        })
    }
}
