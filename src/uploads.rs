use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

/// URL prefix the upload directory is served under.
pub const UPLOAD_URL_PREFIX: &str = "/static/test";
/// URL prefix the detector's result directory is served under.
pub const RESULT_URL_PREFIX: &str = "/static/result";

/// An image persisted to the upload area.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub storage_name: String,
    pub original_filename: String,
    pub path: PathBuf,
}

/// Lowercased extension after the last `.`, if it is on the allow-list.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// ASCII spelling of common accented Latin letters.
fn fold_accent(c: char) -> Option<&'static str> {
    Some(match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'ç' => "c",
        'Ç' => "C",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'ñ' => "n",
        'Ñ' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "O",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        _ => return None,
    })
}

/// Reduce a client filename to a safe single path component.
///
/// Common accents are folded to ASCII, path separators and whitespace become
/// `_` boundaries, anything else outside `[A-Za-z0-9_.-]` is dropped, and
/// leading/trailing `.` and `_` are trimmed.
pub fn sanitize_filename(filename: &str) -> String {
    lazy_static! {
        static ref UNSAFE_RE: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
    }
    let mut spaced = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '/' | '\\' => spaced.push(' '),
            c => match fold_accent(c) {
                Some(ascii) => spaced.push_str(ascii),
                None => spaced.push(c),
            },
        }
    }
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_RE
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Unique storage name: a random UUID joined with the sanitized client name.
pub fn storage_name(original: &str, ext: &str) -> String {
    let id = Uuid::new_v4();
    match sanitize_filename(original) {
        s if s.is_empty() => format!("{}.{}", id, ext),
        s => format!("{}_{}", id, s),
    }
}

/// Validate an incoming file and write it to `upload_dir`.
///
/// Nothing touches the disk unless every check passes.
pub async fn accept(
    upload_dir: &Path,
    max_bytes: usize,
    body: Bytes,
    client_filename: &str,
) -> AppResult<StoredImage> {
    if client_filename.is_empty() {
        return Err(AppError::NoFile("No file selected"));
    }
    let Some(ext) = allowed_extension(client_filename) else {
        warn!(filename = %client_filename, "rejected file type");
        return Err(AppError::UnsupportedType);
    };
    if body.len() > max_bytes {
        warn!(size = body.len(), max_bytes, "rejected oversized upload");
        return Err(AppError::PayloadTooLarge { limit: max_bytes });
    }

    let storage_name = storage_name(client_filename, &ext);
    let path = upload_dir.join(&storage_name);
    write_new(upload_dir, &path, &body)
        .await
        .map_err(AppError::StorageUnavailable)?;
    debug!(storage_name = %storage_name, size = body.len(), "upload stored");

    Ok(StoredImage {
        storage_name,
        original_filename: client_filename.to_string(),
        path,
    })
}

async fn write_new(dir: &Path, path: &Path, body: &[u8]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create upload dir {}", dir.display()))?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("write upload {}", path.display()))?;
    Ok(())
}
