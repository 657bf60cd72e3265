use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::repo_types::UserId;

pub type AnalysisId = i64;

/// One stored outcome of an upload + inference cycle.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub user_id: Option<UserId>,
    pub image_filename: String,
    pub original_filename: String,
    pub analysis_results: Option<String>,
    pub detected_abnormality: Option<String>,
    pub confidence_score: Option<f64>,
    pub analysis_timestamp: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis<'a> {
    pub user_id: UserId,
    pub image_filename: &'a str,
    pub original_filename: &'a str,
    pub analysis_results: &'a str,
    pub detected_abnormality: &'a str,
    pub confidence_score: f64,
}
