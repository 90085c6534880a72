//! AuroraMind Core - streaming chat gateway internals
//!
//! - [`store`]: the session store task owning sessions, messages, and
//!   in-memory documents
//! - [`upstream`]: token sources (AI service and placeholder fallback)
//! - [`relay`]: per-request coordinator between a token source and a client
//! - [`documents`]: document repository capability and upload file storage
//! - [`ingest`]: fire-and-forget ingestion notifications

pub mod documents;
pub mod error;
pub mod ingest;
pub mod models;
pub mod relay;
pub mod store;
pub mod upstream;

pub use error::{DocumentError, NotifyError, RelayError, StoreError, UpstreamError};
pub use store::SessionStore;

use std::path::PathBuf;
use std::sync::Arc;

use documents::{DocumentRepository, UploadStorage, open_repository};
use ingest::{HttpIngestNotifier, IngestDispatcher};
use relay::StreamingRelay;
use tokio_util::sync::CancellationToken;
use upstream::{UpstreamConfig, build_http_client, build_token_source};

/// Settings needed to assemble the gateway core
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub upstream: UpstreamConfig,
    /// Root directory for uploaded files
    pub storage_path: PathBuf,
    /// redb file for document records; `None` keeps documents in memory
    pub database_path: Option<String>,
}

/// Core application state shared by every request handler
pub struct AppCore {
    pub store: SessionStore,
    pub relay: StreamingRelay,
    pub documents: Arc<dyn DocumentRepository>,
    pub uploads: UploadStorage,
    pub ingest: IngestDispatcher,
    /// Cancelled on shutdown; every relay run uses a child token
    pub shutdown: CancellationToken,
}

impl AppCore {
    pub async fn new(settings: CoreSettings) -> anyhow::Result<Self> {
        let client = build_http_client(settings.upstream.timeout)?;

        let store = SessionStore::spawn();
        let source = build_token_source(&settings.upstream, client.clone());
        let relay = StreamingRelay::new(store.clone(), source);
        let documents = open_repository(settings.database_path.as_deref(), &store)?;

        let notifier = HttpIngestNotifier::new(
            client,
            settings.upstream.url.as_deref(),
            settings.upstream.service_token.clone(),
        );
        let ingest = IngestDispatcher::spawn(Arc::new(notifier));

        tracing::info!(
            document_backend = documents.backend(),
            upstream = settings.upstream.url.as_deref().unwrap_or("fallback"),
            storage = %settings.storage_path.display(),
            "Gateway core initialized"
        );

        Ok(Self {
            store,
            relay,
            documents,
            uploads: UploadStorage::new(settings.storage_path),
            ingest,
            shutdown: CancellationToken::new(),
        })
    }
}
