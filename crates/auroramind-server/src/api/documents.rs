use crate::api::{
    ApiResponse,
    response::{ApiError, ApiResult},
    state::AppState,
};
use auroramind_core::models::Document;
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

/// Request body limit for uploads
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

const UPLOAD_FIELD: &str = "file";
const UNNAMED_UPLOAD: &str = "upload";

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub status: &'static str,
    pub document_id: String,
}

// POST /v1/kb/{id}/documents
pub async fn upload_document(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<Document>>)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(UNNAMED_UPLOAD)
            .to_string();
        let contents = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, contents));
        break;
    }

    let Some((file_name, contents)) = upload else {
        return Err(ApiError::BadRequest("file required".to_string()));
    };

    let document_id = Uuid::new_v4().to_string();
    let storage_uri = state
        .uploads
        .store(&collection_id, &document_id, &file_name, &contents)
        .await?;

    let document = Document::uploaded(document_id, collection_id, file_name, storage_uri);
    if let Err(e) = state.documents.put(document.clone()).await {
        state.uploads.remove(&document.storage_uri).await;
        return Err(e.into());
    }

    tracing::info!(
        document_id = %document.id,
        collection_id = %document.collection_id,
        bytes = contents.len(),
        "Document uploaded"
    );
    state.ingest.dispatch(&document);

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(document))))
}

// GET /v1/kb/{id}/documents
pub async fn list_documents(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Document>>>> {
    let documents = state.documents.list(&collection_id).await?;
    Ok(Json(ApiResponse::ok(documents)))
}

// DELETE /v1/kb/{id}/documents/{doc_id}
pub async fn delete_document(
    State(state): State<AppState>,
    Path((collection_id, document_id)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<DeleteDocumentResponse>>> {
    let document = state.documents.delete(&collection_id, &document_id).await?;
    state.uploads.remove(&document.storage_uri).await;

    Ok(Json(ApiResponse::ok(DeleteDocumentResponse {
        status: "deleted",
        document_id: document.id,
    })))
}
