use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::model::ExtractionBatch;

/// A raw uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Guess a mime type from the file extension.
    pub fn mime_for(name: &str) -> &'static str {
        let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => "application/pdf",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("txt") => "text/plain",
            _ => "application/octet-stream",
        }
    }
}

/// The AI extraction collaborator: turns raw files into one batch.
///
/// Retries, prompting and transport all live behind this trait.
pub trait Extractor {
    fn extract(&self, files: &[SourceFile]) -> Result<ExtractionBatch, ExtractionError>;
}

impl<F> Extractor for F
where
    F: Fn(&[SourceFile]) -> Result<ExtractionBatch, ExtractionError>,
{
    fn extract(&self, files: &[SourceFile]) -> Result<ExtractionBatch, ExtractionError> {
        self(files)
    }
}
