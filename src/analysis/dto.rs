use serde::Serialize;

/// Body of a successful `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub results: UploadResults,
}

#[derive(Debug, Serialize)]
pub struct UploadResults {
    pub filename: String,
    pub original_filename: String,
    pub detected_abnormality: String,
    pub confidence_score: f64,
    pub has_result_image: bool,
    pub original_image_url: String,
    pub result_image_url: Option<String>,
}
