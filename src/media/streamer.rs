//! HTTP handlers for media upload, byte-range streaming, and the
//! administrative storage surface.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::server::SyncServer;

use super::range::{parse_range, RangeError};
use super::store::{content_type_for, MediaError, StoredObject};

const EXPOSED_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";

/// Upload response, shaped the way web clients already consume it.
#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    video: UploadedVideo,
}

#[derive(Debug, Serialize)]
struct UploadedVideo {
    id: String,
    name: String,
    size: u64,
    #[serde(rename = "type")]
    mime_type: String,
    filename: String,
}

/// `POST /api/upload` — accept a single multipart field named `video`.
pub async fn upload_handler(
    State(server): State<Arc<SyncServer>>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected unreadable multipart body");
                return error_response(StatusCode::BAD_REQUEST, "unreadable multipart body");
            }
        };

        if field.name() != Some("video") {
            continue;
        }

        let mime_type = field.content_type().map(str::to_string);
        let Some(mime_type) = mime_type.filter(|m| m.starts_with("video/")) else {
            tracing::warn!(declared = ?field.content_type(), "Rejected non-video upload");
            return error_response(StatusCode::BAD_REQUEST, "only video uploads are accepted");
        };
        let name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("upload")
            .to_string();

        return store_field(&server, field, name, mime_type).await;
    }

    error_response(
        StatusCode::BAD_REQUEST,
        "multipart body is missing the 'video' field",
    )
}

async fn store_field(
    server: &SyncServer,
    mut field: axum::extract::multipart::Field<'_>,
    name: String,
    mime_type: String,
) -> Response {
    let mut sink = match server.media().begin_upload().await {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open upload sink");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable");
        }
    };

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = sink.write_chunk(&chunk).await {
                    let response = media_error_response(&e);
                    sink.abort().await;
                    return response;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Upload stream ended abnormally");
                sink.abort().await;
                return error_response(StatusCode::BAD_REQUEST, "upload stream ended abnormally");
            }
        }
    }

    match sink.finish(name, mime_type).await {
        Ok(video) => {
            tracing::info!(
                key = %video.storage_key,
                size = video.size,
                name = %video.name,
                "Stored uploaded video"
            );
            (
                StatusCode::OK,
                Json(UploadResponse {
                    success: true,
                    video: UploadedVideo {
                        id: video.id,
                        name: video.name,
                        size: video.size,
                        mime_type: video.mime_type,
                        filename: video.storage_key,
                    },
                }),
            )
                .into_response()
        }
        Err(e) => media_error_response(&e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    /// Authoritative mime override; stored keys carry no extension
    #[serde(rename = "type")]
    content_type: Option<String>,
}

/// `GET /api/video/{key}` — serve stored bytes, honouring single-range
/// `Range` requests with exact `Content-Range` accounting.
pub async fn stream_handler(
    State(server): State<Arc<SyncServer>>,
    Path(key): Path<String>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> Response {
    let (file, size) = match server.media().open_object(&key).await {
        Ok(opened) => opened,
        Err(e) => return media_error_response(&e),
    };
    let content_type = content_type_for(&key, params.content_type.as_deref());

    let range_header = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    match range_header {
        Some(raw) => match parse_range(raw, size) {
            Ok(range) => partial_response(file, size, range, &content_type).await,
            Err(RangeError::Unsatisfiable) => {
                let mut response =
                    error_response(StatusCode::RANGE_NOT_SATISFIABLE, "range not satisfiable");
                if let Ok(value) = format!("bytes */{size}").parse() {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_RANGE, value);
                }
                response
            }
            // Unparsable ranges degrade to a full-body response
            Err(RangeError::Malformed) => full_response(file, size, &content_type),
        },
        None => full_response(file, size, &content_type),
    }
}

async fn partial_response(
    mut file: tokio::fs::File,
    size: u64,
    range: super::range::ByteRange,
    content_type: &str,
) -> Response {
    if let Err(e) = file.seek(SeekFrom::Start(range.start)).await {
        tracing::warn!(error = %e, "Failed to seek stored media");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "read failure mid-stream");
    }
    let body = Body::from_stream(ReaderStream::new(file.take(range.len())));

    match Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, range.len())
        .header(header::CONTENT_RANGE, range.content_range(size))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSED_HEADERS)
        .body(body)
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build partial-content response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn full_response(file: tokio::fs::File, size: u64, content_type: &str) -> Response {
    let body = Body::from_stream(ReaderStream::new(file));

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_EXPOSE_HEADERS, EXPOSED_HEADERS)
        .body(body)
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build full-body response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageListing {
    files: Vec<StoredObject>,
    total_size: u64,
    count: usize,
}

/// `GET /api/admin/storage` — list stored media.
pub async fn admin_storage_handler(State(server): State<Arc<SyncServer>>) -> Response {
    match server.media().list().await {
        Ok(files) => {
            let total_size = files.iter().map(|f| f.size).sum();
            let count = files.len();
            Json(StorageListing {
                files,
                total_size,
                count,
            })
            .into_response()
        }
        Err(e) => media_error_response(&e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupParams {
    days: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupReport {
    deleted: usize,
    freed_bytes: u64,
}

const DEFAULT_CLEANUP_DAYS: u64 = 7;

/// `DELETE /api/admin/cleanup?days=N` — delete media older than N days.
pub async fn admin_cleanup_handler(
    State(server): State<Arc<SyncServer>>,
    Query(params): Query<CleanupParams>,
) -> Response {
    let days = params.days.unwrap_or(DEFAULT_CLEANUP_DAYS);
    let age = Duration::from_secs(days.saturating_mul(24 * 60 * 60));
    match server.media().sweep_older_than(age).await {
        Ok((deleted, freed_bytes)) => {
            tracing::info!(days, deleted, freed_bytes, "Swept aged media");
            Json(CleanupReport {
                deleted,
                freed_bytes,
            })
            .into_response()
        }
        Err(e) => media_error_response(&e),
    }
}

/// `DELETE /api/admin/cleanup-all` — delete every stored object.
pub async fn admin_cleanup_all_handler(State(server): State<Arc<SyncServer>>) -> Response {
    match server.media().sweep_all().await {
        Ok((deleted, freed_bytes)) => {
            tracing::info!(deleted, freed_bytes, "Cleared media store");
            Json(CleanupReport {
                deleted,
                freed_bytes,
            })
            .into_response()
        }
        Err(e) => media_error_response(&e),
    }
}

fn media_error_response(err: &MediaError) -> Response {
    match err {
        MediaError::NotFound | MediaError::InvalidKey => {
            error_response(StatusCode::NOT_FOUND, "no stored media under that key")
        }
        MediaError::TooLarge { limit } => error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("upload exceeds the maximum size of {limit} bytes"),
        ),
        MediaError::Io(e) => {
            tracing::error!(error = %e, "Media store I/O failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
        }
    }
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}
