//! Image listing, upload, serving and deletion routes.
//!
//! Ajax callers (`X-Requested-With: XMLHttpRequest`) get JSON; browser form
//! posts get a redirect back to `/` with a flashed message.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use bytes::Bytes;
use imagebed_store::{Error as StoreError, StoredImage, UploadOutcome};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use super::auth::AuthSession;
use super::error::{run_blocking, AppError};
use super::{flash, AppContext};
use crate::config::ServerConfig;

pub const UPLOAD_FIELD: &str = "file";
pub const UPLOAD_SUCCESS: &str = "Upload successful";
pub const DELETE_SUCCESS: &str = "Deleted successfully";

// ============================================================================
// Response types
// ============================================================================

/// Upload result, including ready-to-paste embed snippets on success.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbcode_url: Option<String>,
}

impl UploadResponse {
    pub fn success(outcome: UploadOutcome, base_url: &str) -> Self {
        let full_url = format!("{}{}", base_url, outcome.url);
        Self {
            success: true,
            message: UPLOAD_SUCCESS.to_string(),
            markdown_url: Some(format!("![{}]({})", outcome.filename, full_url)),
            html_url: Some(format!(
                "<img src=\"{}\" alt=\"{}\">",
                full_url, outcome.filename
            )),
            bbcode_url: Some(format!("[img]{}[/img]", full_url)),
            full_url: Some(full_url),
            filename: Some(outcome.filename),
            url: Some(outcome.url),
            hash: Some(outcome.hash),
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            filename: None,
            url: None,
            hash: None,
            full_url: None,
            markdown_url: None,
            html_url: None,
            bbcode_url: None,
        }
    }
}

/// Outcome of a delete request.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Helpers
// ============================================================================

pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// Base URL that stored paths are appended to when building links.
pub fn base_url(config: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_url {
        return url.trim_end_matches('/').to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|s| *s == "http" || *s == "https")
        .unwrap_or("http");

    format!("{scheme}://{host}")
}

/// Pull the `file` field out of a multipart body.
async fn read_upload(mut multipart: Multipart, limit: u64) -> Result<(String, Bytes), StoreError> {
    let to_store_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StoreError::FileTooLarge { limit }
        } else {
            tracing::debug!("Malformed multipart upload: {}", e);
            StoreError::MissingFile
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(to_store_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(to_store_error)?;
        return Ok((name, data));
    }

    Err(StoreError::MissingFile)
}

/// Failed uploads answer 400, except for the size limit which keeps 413.
/// Server-side failures are logged here since the client only sees a 400.
fn upload_failure_status(err: &AppError) -> StatusCode {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!("Upload failed: {}", err);
        StatusCode::BAD_REQUEST
    } else {
        tracing::debug!("Upload rejected: {}", err);
        status
    }
}

fn flash_redirect(jar: CookieJar, message: &str) -> Response {
    (flash::set(jar, message), Redirect::to("/")).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// List stored images, newest first.
pub async fn index(
    State(ctx): State<AppContext>,
    Extension(session): Extension<AuthSession>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let store = ctx.store.clone();
    let images: Vec<StoredImage> = run_blocking(move || store.list()).await?;
    tracing::debug!(count = images.len(), expires_at = session.expires_at, "Listing images");

    if is_ajax(&headers) {
        return Ok(Json(images).into_response());
    }

    let accept = ctx
        .store
        .allowed_extensions()
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let (jar, flash) = flash::take(jar);
    let page = ctx
        .templates
        .render_index(&images, flash.as_deref(), &accept, ctx.store.max_file_size())?;
    Ok((jar, page).into_response())
}

/// Accept a multipart upload (field `file`).
pub async fn upload(
    State(ctx): State<AppContext>,
    Extension(_session): Extension<AuthSession>,
    headers: HeaderMap,
    jar: CookieJar,
    multipart: Multipart,
) -> Response {
    let result = match read_upload(multipart, ctx.store.max_file_size()).await {
        Ok((name, data)) => {
            let store = ctx.store.clone();
            run_blocking(move || store.upload(&data, &name)).await
        }
        Err(e) => Err(AppError::from(e)),
    };

    let (status, response) = match result {
        Ok(outcome) => (
            StatusCode::OK,
            UploadResponse::success(outcome, &base_url(&ctx.config.server, &headers)),
        ),
        Err(err) => (upload_failure_status(&err), UploadResponse::failure(err.message())),
    };

    if is_ajax(&headers) {
        (status, Json(response)).into_response()
    } else {
        flash_redirect(jar, &response.message)
    }
}

/// Delete a stored image.
pub async fn delete_image(
    State(ctx): State<AppContext>,
    Extension(_session): Extension<AuthSession>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let store = ctx.store.clone();
    let result = run_blocking(move || store.delete(&filename)).await;

    let (status, response) = match result {
        Ok(()) => (
            StatusCode::OK,
            ActionResponse {
                success: true,
                message: DELETE_SUCCESS.to_string(),
            },
        ),
        Err(err) => (
            err.status(),
            ActionResponse {
                success: false,
                message: err.message(),
            },
        ),
    };

    if is_ajax(&headers) {
        (status, Json(response)).into_response()
    } else {
        flash_redirect(jar, &response.message)
    }
}

/// Serve raw image bytes.
pub async fn serve_image(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    stream_image(&ctx, filename, false).await
}

/// Serve an image as a download.
pub async fn download_image(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    stream_image(&ctx, filename, true).await
}

async fn stream_image(
    ctx: &AppContext,
    filename: String,
    attachment: bool,
) -> Result<Response, AppError> {
    let store = ctx.store.clone();
    let name = filename.clone();
    let path = run_blocking(move || store.resolve(&name)).await?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(filename.clone()),
            _ => StoreError::Io(e),
        })?;

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();
    let body = Body::from_stream(ReaderStream::new(file));

    let disposition = if attachment {
        format!("attachment; filename=\"{}\"", filename.replace('"', ""))
    } else {
        "inline".to_string()
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        body,
    )
        .into_response())
}
