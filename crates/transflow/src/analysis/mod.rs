//! Document analysis: the data an upload yields and the adapter that obtains it.

pub mod http;
pub mod local;
mod text;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::{AnalysisError, WorkflowError};

pub use http::HttpAnalyzer;
pub use local::LocalAnalyzer;

/// Format of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    Pdf,
    Docx,
    Xlsx,
    Pptx,
    Txt,
    Html,
    Unknown,
}

impl FileFormat {
    /// Every format an analyzer can recognize.
    pub const RECOGNIZED: [FileFormat; 6] = [
        FileFormat::Pdf,
        FileFormat::Docx,
        FileFormat::Xlsx,
        FileFormat::Pptx,
        FileFormat::Txt,
        FileFormat::Html,
    ];

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" => Self::Xlsx,
            "pptx" => Self::Pptx,
            "txt" | "text" => Self::Txt,
            "html" | "htm" => Self::Html,
            _ => Self::Unknown,
        }
    }

    pub fn from_file_name(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Xlsx => "XLSX",
            Self::Pptx => "PPTX",
            Self::Txt => "TXT",
            Self::Html => "HTML",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PDF" => Ok(Self::Pdf),
            "DOCX" => Ok(Self::Docx),
            "XLSX" => Ok(Self::Xlsx),
            "PPTX" => Ok(Self::Pptx),
            "TXT" => Ok(Self::Txt),
            "HTML" => Ok(Self::Html),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(other.to_string()),
        }
    }
}

/// A file handed in by the user.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads a file from disk, keeping only its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn format(&self) -> FileFormat {
        FileFormat::from_file_name(&self.file_name)
    }
}

/// Immutable result of inspecting an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub file_name: String,
    pub file_format: FileFormat,
    pub file_size_bytes: u64,
    pub word_count: u64,
    pub char_count: u64,
    pub images_with_text: u64,
    pub source_language: String,
    pub subject_matter: String,
}

/// A content-inspection capability.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, file: &UploadedFile) -> Result<DocumentAnalysis, AnalysisError>;
}

/// Wraps a [`DocumentAnalyzer`] with the intake rules every upload goes through.
///
/// Empty files are refused before the analyzer is called. Formats outside the
/// allow-list come back as [`FileFormat::Unknown`] instead of failing.
#[derive(Clone)]
pub struct FileAnalysisAdapter {
    analyzer: Arc<dyn DocumentAnalyzer>,
    supported: HashSet<FileFormat>,
}

impl FileAnalysisAdapter {
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, supported: &[FileFormat]) -> Self {
        Self {
            analyzer,
            supported: supported.iter().copied().collect(),
        }
    }

    pub fn supports(&self, format: FileFormat) -> bool {
        self.supported.contains(&format)
    }

    pub async fn analyze(&self, file: &UploadedFile) -> Result<DocumentAnalysis, WorkflowError> {
        let span = tracing::info_span!("analysis", file = %file.file_name);
        self.analyze_checked(file).instrument(span).await
    }

    async fn analyze_checked(
        &self,
        file: &UploadedFile,
    ) -> Result<DocumentAnalysis, WorkflowError> {
        if file.is_empty() {
            return Err(AnalysisError::EmptyFile(file.file_name.clone()).into());
        }

        let mut analysis = self.analyzer.analyze(file).await.map_err(|e| {
            log::warn!("Analysis of '{}' failed: {}", file.file_name, e);
            WorkflowError::from(e)
        })?;

        if analysis.file_format != FileFormat::Unknown && !self.supports(analysis.file_format) {
            log::debug!(
                "Format {} of '{}' is not in the allow-list, treating as UNKNOWN",
                analysis.file_format,
                file.file_name
            );
            analysis.file_format = FileFormat::Unknown;
        }

        log::info!(
            "Analyzed '{}': {} words, {} chars, format {}",
            analysis.file_name,
            analysis.word_count,
            analysis.char_count,
            analysis.file_format
        );

        Ok(analysis)
    }
}
