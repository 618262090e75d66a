use crate::error::{ExtractError, LlmError};
use crate::traits::{CompletionClient, CompletionRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiClient {
    endpoint: Url,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractError> {
        let endpoint = chat_completions_url(api_base)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn chat_completions_url(api_base: &str) -> Result<Url, ExtractError> {
    let base = format!("{}/", api_base.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join("chat/completions")?)
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut http = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(api_key) = &self.api_key {
            http = http.bearer_auth(api_key);
        }

        let response = http.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        reply_text(payload)
    }
}

fn reply_text(payload: ChatResponse) -> Result<String, LlmError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| LlmError::InvalidResponse("response has no message content".to_string()))
}
