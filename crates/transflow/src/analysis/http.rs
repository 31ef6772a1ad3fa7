//! Remote document analysis over HTTP.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::{DocumentAnalysis, DocumentAnalyzer, UploadedFile};
use crate::error::AnalysisError;

/// Header carrying the original file name alongside the raw upload.
pub const FILE_NAME_HEADER: &str = "X-File-Name";

/// Posts the raw document to `{endpoint}/analyze` and decodes the JSON analysis.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for HttpAnalyzer {
    async fn analyze(&self, file: &UploadedFile) -> Result<DocumentAnalysis, AnalysisError> {
        let content_type = mime_guess::from_path(&file.file_name)
            .first_or_octet_stream()
            .to_string();

        let response = self
            .client
            .post(format!("{}/analyze", self.endpoint))
            .header(CONTENT_TYPE, content_type)
            .header(FILE_NAME_HEADER, &file.file_name)
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| AnalysisError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Unreachable(format!(
                "analysis service returned {}: {}",
                status, body
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::Unreachable(e.to_string()))?;

        serde_json::from_slice::<DocumentAnalysis>(&body)
            .map_err(|e| AnalysisError::Malformed(e.to_string()))
    }
}
