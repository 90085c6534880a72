pub mod auth;
pub mod chat_stream;
pub mod documents;
pub mod response;
pub mod sessions;
pub mod state;

pub use response::ApiResponse;

use crate::middleware::require_credential;
use auth::{health, login};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, Method, header},
    middleware,
    routing::{delete, get, post},
};
use chat_stream::stream_message;
use documents::{MAX_UPLOAD_BYTES, delete_document, list_documents, upload_document};
use sessions::{create_session, get_session, list_session_messages, list_sessions};
use state::AppState;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-service-token"),
        ])
}

/// Build the gateway router. Everything under `/v1` except login requires
/// an `Authorization` header.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        // Sessions
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/messages", get(list_session_messages))
        .route("/sessions/{id}/messages/stream", post(stream_message))
        // Knowledge-base documents
        .route(
            "/kb/{id}/documents",
            get(list_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/kb/{id}/documents/{doc_id}", delete(delete_document))
        .route_layer(middleware::from_fn(require_credential));

    let v1 = Router::new()
        .route("/auth/login", post(login))
        .merge(protected);

    Router::new()
        .route("/health", get(health))
        .nest("/v1", v1)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use auroramind_core::AppCore;
    use auroramind_core::SessionStore;
    use auroramind_core::documents::{MemoryDocumentRepository, UploadStorage};
    use auroramind_core::error::NotifyError;
    use auroramind_core::ingest::{IngestDispatcher, IngestNotice, IngestNotifier};
    use auroramind_core::relay::StreamingRelay;
    use auroramind_core::upstream::FallbackTokenSource;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    const AUTH: &str = "Bearer demo-token";

    /// Records every notice it is asked to deliver.
    struct RecordingNotifier {
        notices: mpsc::UnboundedSender<IngestNotice>,
    }

    #[async_trait]
    impl IngestNotifier for RecordingNotifier {
        async fn notify(&self, notice: &IngestNotice) -> Result<(), NotifyError> {
            let _ = self.notices.send(notice.clone());
            Ok(())
        }
    }

    struct TestApp {
        router: Router,
        notices: mpsc::UnboundedReceiver<IngestNotice>,
        _uploads: TempDir,
    }

    fn test_app() -> TestApp {
        let uploads = tempfile::tempdir().unwrap();
        let (notices_tx, notices) = mpsc::unbounded_channel();

        let store = SessionStore::spawn();
        let core = AppCore {
            relay: StreamingRelay::new(
                store.clone(),
                Arc::new(FallbackTokenSource::new(Duration::ZERO)),
            ),
            documents: Arc::new(MemoryDocumentRepository::new(store.clone())),
            uploads: UploadStorage::new(uploads.path()),
            ingest: IngestDispatcher::spawn(Arc::new(RecordingNotifier {
                notices: notices_tx,
            })),
            shutdown: CancellationToken::new(),
            store,
        };

        TestApp {
            router: router(Arc::new(core)),
            notices,
            _uploads: uploads,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, AUTH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, AUTH)
            .body(Body::empty())
            .unwrap()
    }

    async fn create_session(router: &Router, title: &str, kb: &str) -> Value {
        let (status, body) = send(
            router,
            json_request(
                "POST",
                "/v1/sessions",
                json!({ "title": title, "default_kb_id": kb }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_str::<Value>(&body).unwrap()["data"].clone()
    }

    /// Split an event-stream body into (event, data) pairs.
    fn parse_events(body: &str) -> Vec<(String, String)> {
        body.split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(|block| {
                let mut event = String::new();
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event: ") {
                        event = value.to_string();
                    } else if let Some(value) = line.strip_prefix("data: ") {
                        data = value.to_string();
                    }
                }
                (event, data)
            })
            .collect()
    }

    fn multipart_request(uri: &str, field: &str, file_name: &str, contents: &str) -> Request<Body> {
        let boundary = "auroramind-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n--{boundary}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, AUTH)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_credentials() {
        let app = test_app();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_v1_routes_require_authorization_header() {
        let app = test_app();
        let request = Request::builder()
            .uri("/v1/sessions")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_login_issues_demo_token_without_credentials() {
        let app = test_app();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "email": "a@b.c", "password": "pw" }).to_string(),
            ))
            .unwrap();

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        let data = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        assert!(data["token"].as_str().unwrap().starts_with("demo-"));
        assert_eq!(data["expires_in_seconds"], 86400);

        let malformed = Request::builder()
            .method("POST")
            .uri("/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"email\":"))
            .unwrap();
        let (status, _) = send(&app.router, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let app = test_app();

        let first = create_session(&app.router, "  ", "").await;
        assert_eq!(first["title"], "New Chat");
        assert_eq!(first["default_kb_id"], "");
        let second = create_session(&app.router, "Research", "kb-2").await;

        let (status, body) = send(&app.router, get_request("/v1/sessions")).await;
        assert_eq!(status, StatusCode::OK);
        let sessions = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        assert_eq!(sessions.as_array().unwrap().len(), 2);
        assert_eq!(sessions[0]["id"], second["id"]);

        let uri = format!("/v1/sessions/{}", first["id"].as_str().unwrap());
        let (status, _) = send(&app.router, get_request(&uri)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app.router, get_request("/v1/sessions/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["success"], false);
    }

    #[tokio::test]
    async fn test_stream_unknown_session_is_rejected_with_error_event() {
        let app = test_app();

        let (status, body) = send(
            &app.router,
            json_request(
                "POST",
                "/v1/sessions/nope/messages/stream",
                json!({ "content": "hi" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let events = parse_events(&body);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "error");
    }

    #[tokio::test]
    async fn test_stream_blank_content_persists_nothing() {
        let app = test_app();
        let session = create_session(&app.router, "t", "kb").await;
        let id = session["id"].as_str().unwrap();

        let (status, body) = send(
            &app.router,
            json_request(
                "POST",
                &format!("/v1/sessions/{id}/messages/stream"),
                json!({ "content": "   " }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(parse_events(&body)[0].0, "error");

        let (_, body) = send(&app.router, get_request(&format!("/v1/sessions/{id}/messages"))).await;
        let messages = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        assert!(messages.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_relays_tokens_and_persists_answer() {
        let app = test_app();
        let session = create_session(&app.router, "t", "kb-default").await;
        let id = session["id"].as_str().unwrap();

        let (status, body) = send(
            &app.router,
            json_request(
                "POST",
                &format!("/v1/sessions/{id}/messages/stream"),
                json!({ "content": "What is X?" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let events = parse_events(&body);
        let (done, tokens) = events.split_last().unwrap();
        assert!(tokens.iter().all(|(event, _)| event == "token"));
        let streamed: String = tokens.iter().map(|(_, data)| data.as_str()).collect();
        assert_eq!(
            streamed,
            "AI service unavailable. This is a placeholder stream for: What is X?"
        );

        assert_eq!(done.0, "done");
        let summary: Value = serde_json::from_str(&done.1).unwrap();
        assert_eq!(summary["session_id"], id);
        assert_eq!(summary["kb_id"], "kb-default");
        assert_eq!(summary["tokens"], streamed.len() / 4);
        assert_eq!(summary["degraded"], "generation backend not configured");

        let (_, body) = send(&app.router, get_request(&format!("/v1/sessions/{id}/messages"))).await;
        let messages = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        assert_eq!(messages.as_array().unwrap().len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "What is X?");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], streamed);
        assert_eq!(messages[1]["id"], summary["message_id"]);
    }

    #[tokio::test]
    async fn test_stream_kb_override_is_reported() {
        let app = test_app();
        let session = create_session(&app.router, "t", "kb-default").await;
        let id = session["id"].as_str().unwrap();

        let (_, body) = send(
            &app.router,
            json_request(
                "POST",
                &format!("/v1/sessions/{id}/messages/stream"),
                json!({ "content": "hi", "kb_id": "kb-other" }),
            ),
        )
        .await;

        let events = parse_events(&body);
        let summary: Value = serde_json::from_str(&events.last().unwrap().1).unwrap();
        assert_eq!(summary["kb_id"], "kb-other");
    }

    #[tokio::test]
    async fn test_upload_list_and_delete_document() {
        let mut app = test_app();

        let (status, body) = send(
            &app.router,
            multipart_request("/v1/kb/kb-default/documents", "file", "My Notes.txt", "hello"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let document = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        let storage_uri = document["storage_uri"].as_str().unwrap().to_string();
        assert_eq!(document["status"], "uploaded");
        assert_eq!(document["title"], "My Notes.txt");
        assert!(storage_uri.ends_with("My_Notes.txt"));
        assert!(Path::new(&storage_uri).is_absolute());
        assert_eq!(std::fs::read_to_string(&storage_uri).unwrap(), "hello");

        let notice = tokio::time::timeout(Duration::from_secs(2), app.notices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice.document_id, document["id"].as_str().unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(app.notices.try_recv().is_err());

        let (_, body) = send(&app.router, get_request("/v1/kb/kb-default/documents")).await;
        let listed = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let delete_uri = format!(
            "/v1/kb/kb-default/documents/{}",
            document["id"].as_str().unwrap()
        );
        let delete = Request::builder()
            .method("DELETE")
            .uri(&delete_uri)
            .header(header::AUTHORIZATION, AUTH)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app.router, delete).await;
        assert_eq!(status, StatusCode::OK);
        let data = serde_json::from_str::<Value>(&body).unwrap()["data"].clone();
        assert_eq!(data, json!({ "status": "deleted", "document_id": document["id"] }));
        assert!(!Path::new(&storage_uri).exists());

        let again = Request::builder()
            .method("DELETE")
            .uri(&delete_uri)
            .header(header::AUTHORIZATION, AUTH)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app.router, again).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_without_file_field_is_rejected() {
        let app = test_app();

        let (status, _) = send(
            &app.router,
            multipart_request("/v1/kb/kb-default/documents", "attachment", "a.txt", "x"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
