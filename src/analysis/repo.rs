use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::analysis::repo_types::{AnalysisId, AnalysisRecord, NewAnalysis};
use crate::auth::repo_types::UserId;
use crate::error::AppResult;

#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn record(&self, analysis: NewAnalysis<'_>, at: OffsetDateTime) -> AppResult<AnalysisId>;
    /// The user's analyses, newest first, at most `limit`.
    async fn list_recent(&self, user_id: UserId, limit: i64) -> AppResult<Vec<AnalysisRecord>>;
}

#[derive(Clone)]
pub struct SqliteAnalysisRepository {
    db: SqlitePool,
}

impl SqliteAnalysisRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AnalysisRepository for SqliteAnalysisRepository {
    async fn record(&self, analysis: NewAnalysis<'_>, at: OffsetDateTime) -> AppResult<AnalysisId> {
        let done = sqlx::query(
            r#"
            INSERT INTO analysis_history
                (user_id, image_filename, original_filename, analysis_results,
                 detected_abnormality, confidence_score, analysis_timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(analysis.user_id)
        .bind(analysis.image_filename)
        .bind(analysis.original_filename)
        .bind(analysis.analysis_results)
        .bind(analysis.detected_abnormality)
        .bind(analysis.confidence_score)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(done.last_insert_rowid())
    }

    async fn list_recent(&self, user_id: UserId, limit: i64) -> AppResult<Vec<AnalysisRecord>> {
        // Ids grow with insertion order, so they break timestamp ties.
        let rows = sqlx::query_as::<_, AnalysisRecord>(
            r#"
            SELECT id, user_id, image_filename, original_filename, analysis_results,
                   detected_abnormality, confidence_score, analysis_timestamp
            FROM analysis_history
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit.max(0))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
