use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub cookie_name: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
    pub result_dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub uploads: UploadConfig,
    /// Program and arguments of the external detector, whitespace separated.
    pub detector_command: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://medical_system.db".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "fetalscan".into()),
            cookie_name: std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "session".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(12 * 60),
        };
        let uploads = UploadConfig {
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "static/test".into())
                .into(),
            result_dir: std::env::var("RESULT_DIR")
                .unwrap_or_else(|_| "static/result".into())
                .into(),
            max_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };
        let detector_command = std::env::var("DETECTOR_COMMAND")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            session,
            uploads,
            detector_command,
        })
    }
}
