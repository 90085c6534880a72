use crate::api::state::AppState;
use auroramind_core::RelayError;
use auroramind_core::relay::{RelayEvent, StreamRequest};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};

/// Relay events buffered between the relay task and the response body
const EVENT_CHANNEL_CAPACITY: usize = 1;

#[derive(Debug, Deserialize)]
pub struct StreamMessageRequest {
    pub content: String,
    #[serde(default)]
    pub kb_id: Option<String>,
}

/// A stream that was refused before any token was produced. Rendered as an
/// event-stream body holding a single `error` event.
#[derive(Debug)]
pub struct StreamRejection {
    status: StatusCode,
    message: String,
}

impl StreamRejection {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<RelayError> for StreamRejection {
    fn from(error: RelayError) -> Self {
        let status = match &error {
            RelayError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            RelayError::BlankContent => StatusCode::BAD_REQUEST,
            RelayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl IntoResponse for StreamRejection {
    fn into_response(self) -> Response {
        let data = serde_json::json!({ "error": self.message });
        let body = format!("event: error\ndata: {}\n\n", data);
        (
            self.status,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response()
    }
}

fn to_sse_event(event: RelayEvent) -> Event {
    match event {
        RelayEvent::Token(fragment) => Event::default().event("token").data(fragment),
        RelayEvent::Done(summary) => match Event::default().event("done").json_data(&summary) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode done event");
                Event::default().event("error").data("failed to encode done event")
            }
        },
    }
}

// POST /v1/sessions/{id}/messages/stream
pub async fn stream_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<StreamMessageRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StreamRejection> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            // An unknown session outranks a malformed body.
            state
                .store
                .get_session(&session_id)
                .await
                .map_err(RelayError::from)?;
            return Err(StreamRejection::new(
                StatusCode::BAD_REQUEST,
                rejection.body_text(),
            ));
        }
    };

    let prepared = state
        .relay
        .begin(StreamRequest {
            session_id,
            content: request.content,
            kb_id: request.kb_id,
        })
        .await?;

    tracing::debug!(
        session_id = %prepared.session().id,
        kb_id = %prepared.kb_id(),
        "Starting token stream"
    );

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(prepared.run(events_tx, state.shutdown.child_token()));

    let stream = ReceiverStream::new(events_rx).map(|event| Ok(to_sse_event(event)));
    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejection_renders_single_error_event() {
        let response =
            StreamRejection::from(RelayError::SessionNotFound("s-404".to_string())).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(body.to_vec()).unwrap(),
            "event: error\ndata: {\"error\":\"session 's-404' not found\"}\n\n"
        );
    }

    #[test]
    fn test_blank_content_is_bad_request() {
        let rejection = StreamRejection::from(RelayError::BlankContent);
        assert_eq!(rejection.status, StatusCode::BAD_REQUEST);
        assert_eq!(rejection.message, "content required");
    }
}
