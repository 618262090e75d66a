use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx parse error: {0}")]
    DocxParse(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("no documents found in {0}")]
    NoDocuments(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config parse error: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("LLM call failed: {0}")]
    LlmCall(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Communication(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        LlmError::Communication(error.to_string())
    }
}

/// Why a model reply could not be turned into a JSON object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseIssue {
    #[error("no JSON object found in reply")]
    NoJsonFound,

    #[error("could not decode reply as JSON: {0}")]
    JsonDecode(String),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
