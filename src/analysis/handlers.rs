use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    analysis::{dto::UploadResponse, services::analyze_upload},
    auth::session::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_routes(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_bytes + MULTIPART_OVERHEAD))
}

#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let mut mp = mp.map_err(|e| {
        warn!(error = %e, "upload body is not multipart");
        AppError::NoFile("No file uploaded")
    })?;
    let max_bytes = state.config.uploads.max_bytes;
    let multipart_err = |e: axum::extract::multipart::MultipartError| {
        warn!(error = %e, "multipart read failed");
        if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit: max_bytes }
        } else {
            AppError::NoFile("No file uploaded")
        }
    };

    while let Some(field) = mp.next_field().await.map_err(multipart_err)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let body = field.bytes().await.map_err(multipart_err)?;
        let results = analyze_upload(&state, user_id, body, &filename).await?;
        return Ok(Json(UploadResponse {
            success: true,
            message: "Analysis completed successfully!",
            results,
        }));
    }

    Err(AppError::NoFile("No file uploaded"))
}
