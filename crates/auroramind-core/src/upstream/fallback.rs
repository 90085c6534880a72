use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{StreamOutcome, TokenRequest, TokenSource, emit};

const NOT_CONFIGURED: &str = "generation backend not configured";

/// Deterministic placeholder stream used when no backend is reachable.
#[derive(Debug, Clone)]
pub struct FallbackTokenSource {
    delay: Duration,
}

impl FallbackTokenSource {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn fragments(prompt: &str) -> [String; 3] {
        [
            "AI service unavailable. ".to_string(),
            "This is a placeholder stream for: ".to_string(),
            prompt.to_string(),
        ]
    }

    /// Emit the placeholder fragments with a pause after each one. Returns
    /// false if the stream was cancelled or the receiver went away.
    pub async fn emit_placeholder(
        &self,
        prompt: &str,
        tokens: &mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> bool {
        for fragment in Self::fragments(prompt) {
            if !emit(tokens, cancel, fragment).await {
                return false;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        true
    }
}

#[async_trait]
impl TokenSource for FallbackTokenSource {
    async fn stream_tokens(
        &self,
        request: TokenRequest,
        tokens: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        self.emit_placeholder(&request.prompt, &tokens, &cancel)
            .await;
        StreamOutcome::Degraded(NOT_CONFIGURED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> TokenRequest {
        TokenRequest {
            prompt: prompt.to_string(),
            session_id: "s-1".to_string(),
            kb_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_fallback_emits_placeholder_in_order() {
        let source = FallbackTokenSource::new(Duration::from_millis(1));
        let (tx, mut rx) = mpsc::channel(1);

        let producer = tokio::spawn(async move {
            source
                .stream_tokens(request("What is X?"), tx, CancellationToken::new())
                .await
        });

        let mut received = Vec::new();
        while let Some(token) = rx.recv().await {
            received.push(token);
        }

        assert_eq!(received.len(), 3);
        assert_eq!(
            received.concat(),
            "AI service unavailable. This is a placeholder stream for: What is X?"
        );
        assert_eq!(
            producer.await.unwrap(),
            StreamOutcome::Degraded(NOT_CONFIGURED.to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_stops_after_cancel() {
        let source = FallbackTokenSource::new(Duration::from_millis(50));
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let producer = {
            let cancel = cancel.clone();
            tokio::spawn(async move { source.stream_tokens(request("q"), tx, cancel).await })
        };

        assert_eq!(rx.recv().await.as_deref(), Some("AI service unavailable. "));
        cancel.cancel();
        producer.await.unwrap();

        assert!(rx.recv().await.is_none());
    }
}
