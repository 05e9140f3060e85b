//! Document HTTP handlers.
//!
//! Lifecycle calls block on disk and database I/O, so each one runs on the
//! blocking pool.

use axum::Json;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use crate::document::{Document, DocumentId, Upload};
use crate::error::DocumentError;
use crate::lifecycle::DocumentManager;
use crate::response::{self, ErrorBody};
use crate::server::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct DocumentResponse {
    id: DocumentId,
    name: String,
    file_name: Option<String>,
    size_bytes: Option<u64>,
    created_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            file_name: doc.stored_file_name,
            size_bytes: doc.size_bytes,
            created_at: doc.created_at.to_rfc3339(),
        }
    }
}

/// Fields of a multipart create/update request.
#[derive(Default)]
struct DocumentForm {
    name: Option<String>,
    upload: Option<Upload>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /documents
///
/// Multipart fields: `name` (or `nome`) and `file`.
pub async fn create_document(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let Some(name) = form.name.filter(|n| !n.trim().is_empty()) else {
        return response::bad_request("field 'name' is required").into_response();
    };
    let Some(upload) = form.upload else {
        return response::bad_request("field 'file' is required").into_response();
    };

    match run_blocking(&state, move |manager| manager.create(&name, upload)).await {
        Ok(document) => {
            info!(id = document.id, "Created document via API");
            (StatusCode::OK, Json(DocumentResponse::from(document))).into_response()
        }
        Err(resp) => resp,
    }
}

/// GET /documents/{id}
///
/// Streams the file as an attachment.
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Response {
    let download = match run_blocking(&state, move |manager| manager.fetch_for_download(id)).await
    {
        Ok(download) => download,
        Err(resp) => return resp,
    };

    let body = Body::from_stream(ReaderStream::new(tokio::fs::File::from_std(download.file)));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&download.file_name),
            ),
            (header::CONTENT_LENGTH, download.len.to_string()),
        ],
        body,
    )
        .into_response()
}

/// PUT /documents/{id}
///
/// Multipart fields, both optional: `name` (or `nome`) and `file`.
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    multipart: Multipart,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let result = run_blocking(&state, move |manager| {
        manager.update(id, form.name.as_deref(), form.upload)
    })
    .await;

    match result {
        Ok(_) => response::ok_message("document updated").into_response(),
        Err(resp) => resp,
    }
}

/// DELETE /documents/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
) -> Response {
    match run_blocking(&state, move |manager| manager.delete(id)).await {
        Ok(()) => response::ok_message("document deleted").into_response(),
        Err(resp) => resp,
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_form(mut multipart: Multipart) -> Result<DocumentForm, Response> {
    let mut form = DocumentForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") | Some("nome") => {
                form.name = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(multipart_error)?;
                form.upload = Some(Upload::new(file_name, content));
            }
            _ => {}
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> Response {
    (
        err.status(),
        Json(ErrorBody {
            error: err.body_text(),
        }),
    )
        .into_response()
}

/// Run a lifecycle call on the blocking pool and map its error to a response.
async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, Response>
where
    F: FnOnce(DocumentManager) -> Result<T, DocumentError> + Send + 'static,
    T: Send + 'static,
{
    let manager = state.documents.clone();
    match tokio::task::spawn_blocking(move || f(manager)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(error_response(&e)),
        Err(e) => {
            error!(error = %e, "Blocking document task failed");
            Err(response::internal_error("internal error").into_response())
        }
    }
}

fn error_response(err: &DocumentError) -> Response {
    match err {
        DocumentError::EmptyUpload => response::bad_request(err.to_string()).into_response(),
        DocumentError::NotFound(_) => response::not_found(err.to_string()).into_response(),
        DocumentError::StorageWriteFailed { .. }
        | DocumentError::StorageUnavailable { .. }
        | DocumentError::Record(_) => {
            error!(error = %err, "Document operation failed");
            response::internal_error("failed to store document").into_response()
        }
    }
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987
/// `filename*` for names that are not plain ASCII.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();
    if fallback == file_name {
        return format!("attachment; filename=\"{file_name}\"");
    }

    let mut encoded = String::new();
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_plain_ascii() {
        assert_eq!(
            content_disposition("Contrato_07.txt"),
            "attachment; filename=\"Contrato_07.txt\""
        );
    }

    #[test]
    fn content_disposition_non_ascii_has_encoded_variant() {
        let value = content_disposition("报告_01.pdf");
        assert!(value.starts_with("attachment; filename=\"___01.pdf\""));
        assert!(value.contains("filename*=UTF-8''%E6%8A%A5%E5%91%8A_01.pdf"));
    }

    #[test]
    fn error_mapping() {
        assert_eq!(
            error_response(&DocumentError::EmptyUpload).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(&DocumentError::NotFound(1)).status(),
            StatusCode::NOT_FOUND
        );
        let io = std::io::Error::other("disk full");
        assert_eq!(
            error_response(&DocumentError::StorageWriteFailed {
                path: "/tmp/x".into(),
                source: io,
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
