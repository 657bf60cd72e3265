use bytes::Bytes;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::analysis::dto::UploadResults;
use crate::analysis::repo_types::NewAnalysis;
use crate::auth::repo_types::UserId;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::uploads::{self, RESULT_URL_PREFIX, UPLOAD_URL_PREFIX};

/// Label stored for every analysis until detector output is interpreted.
pub const UNPARSED_LABEL: &str = "Normal Scan";
/// Confidence stored alongside [`UNPARSED_LABEL`].
pub const UNPARSED_CONFIDENCE: f64 = 0.95;

/// Store the upload, run the detector on it and record the outcome.
pub async fn analyze_upload(
    st: &AppState,
    user_id: UserId,
    body: Bytes,
    client_filename: &str,
) -> AppResult<UploadResults> {
    let cfg = &st.config.uploads;
    let stored = uploads::accept(&cfg.upload_dir, cfg.max_bytes, body, client_filename).await?;

    let output = st.detector.detect(&stored.path).await.map_err(|e| {
        error!(error = %e, image = %stored.storage_name, "detector failed");
        AppError::InferenceFailed(e)
    })?;

    let result_path = cfg.result_dir.join(&stored.storage_name);
    let has_result_image = tokio::fs::try_exists(&result_path).await.unwrap_or(false);

    // TODO: derive label and confidence from the detector's detections once its
    // output format is pinned down; until then every scan is stored as the default.
    let detected_abnormality = UNPARSED_LABEL;
    let confidence_score = UNPARSED_CONFIDENCE;
    let raw = raw_payload(output.as_ref());

    let analysis_id = st
        .analyses
        .record(
            NewAnalysis {
                user_id,
                image_filename: &stored.storage_name,
                original_filename: &stored.original_filename,
                analysis_results: &raw,
                detected_abnormality,
                confidence_score,
            },
            OffsetDateTime::now_utc(),
        )
        .await?;
    info!(analysis_id, user_id, image = %stored.storage_name, has_result_image, "analysis recorded");

    Ok(UploadResults {
        original_image_url: format!("{}/{}", UPLOAD_URL_PREFIX, stored.storage_name),
        result_image_url: has_result_image
            .then(|| format!("{}/{}", RESULT_URL_PREFIX, stored.storage_name)),
        filename: stored.storage_name,
        original_filename: stored.original_filename,
        detected_abnormality: detected_abnormality.to_string(),
        confidence_score,
        has_result_image,
    })
}

/// Serialized detector output; empty outputs are stored as `{}`.
fn raw_payload(output: Option<&Value>) -> String {
    match output {
        None | Some(Value::Null) => "{}".into(),
        Some(Value::Array(a)) if a.is_empty() => "{}".into(),
        Some(Value::Object(o)) if o.is_empty() => "{}".into(),
        Some(Value::String(s)) if s.is_empty() => "{}".into(),
        Some(v) => v.to_string(),
    }
}
