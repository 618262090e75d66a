use crate::error::{ExtractError, ParseIssue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Accumulated extraction result for one document.
pub type StructuredRecord = Map<String, Value>;

/// Structural shape of extracted text, which picks the chunking strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    PdfLike,
    MarkdownLike,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Pdf,
    Docx,
    Image,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "png" | "jpg" | "jpeg" => Ok(Self::Image),
            _ => Err(ExtractError::UnsupportedFileType(path.display().to_string())),
        }
    }

    /// PDF text has no reliable block structure; DOCX renders to Markdown and
    /// OCR output is chunked the same way.
    pub fn document_kind(self) -> DocumentKind {
        match self {
            Self::Pdf => DocumentKind::PdfLike,
            Self::Docx | Self::Image => DocumentKind::MarkdownLike,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub format: SourceFormat,
    pub kind: DocumentKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// One chunk's model reply after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Record(StructuredRecord),
    Raw { text: String, issue: ParseIssue },
}

/// Settings forwarded to the completion endpoint on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOptions {
    pub completion: CompletionSettings,
    pub chunking_enabled: bool,
    pub chunk_max_tokens: usize,
    pub preprocess: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            completion: CompletionSettings {
                model: "gpt-4o-mini".to_string(),
                max_tokens: 16_384,
                temperature: 0.0,
            },
            chunking_enabled: false,
            chunk_max_tokens: 16_384,
            preprocess: false,
        }
    }
}
