use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::warn;

use crate::analysis::repo::{AnalysisRepository, SqliteAnalysisRepository};
use crate::auth::repo::{SqliteUserRepository, UserRepository};
use crate::config::AppConfig;
use crate::detector::{CommandDetector, Detector, UnconfiguredDetector};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub analyses: Arc<dyn AnalysisRepository>,
    pub detector: Arc<dyn Detector>,
}

impl AppState {
    pub fn init(config: AppConfig, db: SqlitePool) -> anyhow::Result<Self> {
        let detector = match &config.detector_command {
            Some(cmd) => {
                Arc::new(CommandDetector::new(cmd, &config.uploads.result_dir)?) as Arc<dyn Detector>
            }
            None => {
                warn!("DETECTOR_COMMAND not set; uploads will fail at the inference step");
                Arc::new(UnconfiguredDetector) as Arc<dyn Detector>
            }
        };
        Ok(Self::from_parts(Arc::new(config), db, detector))
    }

    pub fn from_parts(config: Arc<AppConfig>, db: SqlitePool, detector: Arc<dyn Detector>) -> Self {
        Self {
            config,
            users: Arc::new(SqliteUserRepository::new(db.clone())),
            analyses: Arc::new(SqliteAnalysisRepository::new(db)),
            detector,
        }
    }
}
