use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    FallbackTokenSource, SERVICE_TOKEN_HEADER, StreamOutcome, TokenRequest, TokenSource, emit,
};
use crate::error::UpstreamError;

const STREAM_PATH: &str = "/internal/rag/query/stream";

/// How a network stream stopped without an error
enum StreamEnd {
    Completed,
    Stopped,
}

/// Streams line-delimited fragments from the AI service.
pub struct HttpTokenSource {
    client: Client,
    endpoint: String,
    service_token: Option<String>,
    fallback: FallbackTokenSource,
}

impl HttpTokenSource {
    pub fn new(
        client: Client,
        base_url: &str,
        service_token: Option<String>,
        fallback: FallbackTokenSource,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), STREAM_PATH),
            service_token,
            fallback,
        }
    }

    async fn forward(
        &self,
        request: &TokenRequest,
        tokens: &mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> Result<StreamEnd, UpstreamError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.service_token {
            builder = builder.header(SERVICE_TOKEN_HEADER, token);
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamEnd::Stopped),
            response = builder.send() => response?,
        };

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        let mut byte_stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StreamEnd::Stopped),
                chunk = byte_stream.next() => chunk,
            };

            let Some(chunk) = chunk else { break };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // The partial line already arrived; forward it before falling back.
                    if !buffer.is_empty() && !emit(tokens, cancel, decode_line(&buffer)).await {
                        return Ok(StreamEnd::Stopped);
                    }
                    return Err(UpstreamError::Stream(e.to_string()));
                }
            };
            buffer.extend_from_slice(&chunk);

            // One line is one fragment; forward each as soon as it is complete.
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if !emit(tokens, cancel, decode_line(&line)).await {
                    return Ok(StreamEnd::Stopped);
                }
            }
        }

        // Last line without a trailing newline
        if !buffer.is_empty() && !emit(tokens, cancel, decode_line(&buffer)).await {
            return Ok(StreamEnd::Stopped);
        }

        Ok(StreamEnd::Completed)
    }
}

fn decode_line(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.trim_end_matches(['\n', '\r']).to_string()
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn stream_tokens(
        &self,
        request: TokenRequest,
        tokens: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        match self.forward(&request, &tokens, &cancel).await {
            Ok(StreamEnd::Completed) => StreamOutcome::Generated,
            Ok(StreamEnd::Stopped) => {
                debug!(session_id = %request.session_id, "Upstream stream stopped early");
                StreamOutcome::Generated
            }
            Err(error) => {
                warn!(
                    session_id = %request.session_id,
                    error = %error,
                    "AI service unavailable, falling back to placeholder stream"
                );
                self.fallback
                    .emit_placeholder(&request.prompt, &tokens, &cancel)
                    .await;
                StreamOutcome::Degraded(error.to_string())
            }
        }
    }
}
