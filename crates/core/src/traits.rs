use crate::error::{ExtractError, LlmError};
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A chat-completion endpoint. Implementations make one attempt per call.
#[async_trait]
pub trait CompletionClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError>;
}

/// Optical character recognition for scanned resumes.
pub trait OcrEngine: Send + Sync {
    fn recognize_image(&self, path: &Path) -> Result<String, ExtractError>;

    fn recognize_pdf(&self, path: &Path) -> Result<String, ExtractError>;
}
