//! Upstream token source
//!
//! Produces the text fragments of an answer. The HTTP variant streams lines
//! from the generation backend and degrades to the placeholder stream when
//! the backend cannot be reached; the fallback variant only ever produces the
//! placeholder stream. Either way the caller gets a complete stream plus a
//! [`StreamOutcome`] saying whether the text is a real answer.

mod fallback;
mod http;
mod http_client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use fallback::FallbackTokenSource;
pub use http::HttpTokenSource;
pub use http_client::build_http_client;

/// Header carrying the shared secret that authenticates the gateway to the
/// AI service.
pub const SERVICE_TOKEN_HEADER: &str = "X-Service-Token";

/// Body of a generation request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenRequest {
    pub prompt: String,
    pub session_id: String,
    pub kb_id: String,
}

/// How a token stream ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Fragments came from the generation backend (possibly cut short by
    /// cancellation).
    Generated,
    /// The placeholder stream was used; carries the reason.
    Degraded(String),
}

impl StreamOutcome {
    pub fn degradation_reason(&self) -> Option<&str> {
        match self {
            StreamOutcome::Generated => None,
            StreamOutcome::Degraded(reason) => Some(reason),
        }
    }
}

/// A producer of token fragments.
///
/// Implementations send fragments into `tokens` in order and return once the
/// stream is complete, the receiver is gone, or `cancel` fires. No fragment
/// may be sent after cancellation has been observed.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn stream_tokens(
        &self,
        request: TokenRequest,
        tokens: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> StreamOutcome;
}

/// Generation backend settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the AI service, without trailing slash. `None` selects the
    /// fallback stream.
    pub url: Option<String>,
    pub service_token: Option<String>,
    pub timeout: Duration,
    pub fallback_delay: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_token: None,
            timeout: Duration::from_secs(30),
            fallback_delay: Duration::from_millis(50),
        }
    }
}

/// Pick the token source variant from configuration.
pub fn build_token_source(config: &UpstreamConfig, client: reqwest::Client) -> Arc<dyn TokenSource> {
    let fallback = FallbackTokenSource::new(config.fallback_delay);
    match &config.url {
        Some(url) => Arc::new(HttpTokenSource::new(
            client,
            url,
            config.service_token.clone(),
            fallback,
        )),
        None => Arc::new(fallback),
    }
}

/// Send one fragment unless cancellation wins first. Returns false when the
/// stream should stop.
pub(crate) async fn emit(
    tokens: &mpsc::Sender<String>,
    cancel: &CancellationToken,
    fragment: String,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tokens.send(fragment) => sent.is_ok(),
    }
}
