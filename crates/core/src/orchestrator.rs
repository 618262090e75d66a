use crate::chunking::{BpeCounter, Chunker, TokenCounter};
use crate::error::ExtractError;
use crate::merge::merge_fragment;
use crate::models::{DocumentKind, ExtractionOptions, StructuredRecord};
use crate::parser::parse_reply;
use crate::prompts::{
    extraction_prompt, preprocess_prompt, EXTRACTION_SYSTEM_PROMPT, PREPROCESS_SYSTEM_PROMPT,
};
use crate::traits::{CompletionClient, CompletionRequest};
use tracing::{debug, info};

/// Turns one document's text into a structured record.
///
/// Chunks are sent one at a time, in order, and each reply is folded into the
/// accumulator before the next request. A failed completion aborts the
/// document.
pub struct ResumeExtractor<C, T = BpeCounter>
where
    C: CompletionClient,
{
    client: C,
    options: ExtractionOptions,
    chunker: Chunker<T>,
}

impl<C> ResumeExtractor<C, BpeCounter>
where
    C: CompletionClient + Send + Sync,
{
    /// Budgets chunks with the tokenizer of the configured completion model.
    pub fn new(client: C, options: ExtractionOptions) -> Result<Self, ExtractError> {
        let chunker = Chunker::for_model(&options.completion.model, options.chunk_max_tokens)?;
        Ok(Self::with_chunker(client, options, chunker))
    }
}

impl<C, T> ResumeExtractor<C, T>
where
    C: CompletionClient + Send + Sync,
    T: TokenCounter,
{
    /// `chunker`'s budget takes precedence over `options.chunk_max_tokens`.
    pub fn with_chunker(client: C, options: ExtractionOptions, chunker: Chunker<T>) -> Self {
        Self {
            client,
            options,
            chunker,
        }
    }

    pub async fn process(
        &self,
        text: &str,
        kind: DocumentKind,
    ) -> Result<StructuredRecord, ExtractError> {
        let prepared;
        let text = if self.options.preprocess {
            info!(text_len = text.len(), "preprocessing extracted text");
            prepared = self
                .complete(PREPROCESS_SYSTEM_PROMPT, &preprocess_prompt(text))
                .await?;
            prepared.as_str()
        } else {
            text
        };

        let mut record = StructuredRecord::new();

        if !self.options.chunking_enabled {
            info!("extracting without chunking");
            let reply = self
                .complete(EXTRACTION_SYSTEM_PROMPT, &extraction_prompt(text))
                .await?;
            merge_fragment(&mut record, parse_reply(&reply));
            return Ok(record);
        }

        let chunks = self.chunker.chunk(text, kind);
        let total = chunks.len();
        for chunk in chunks {
            info!(chunk = chunk.index + 1, total, "processing chunk");
            let reply = self
                .complete(EXTRACTION_SYSTEM_PROMPT, &extraction_prompt(&chunk.text))
                .await?;
            merge_fragment(&mut record, parse_reply(&reply));
        }

        Ok(record)
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ExtractError> {
        let completion = &self.options.completion;
        debug!(prompt_len = user_prompt.len(), model = %completion.model, "sending completion");

        let reply = self
            .client
            .complete(CompletionRequest {
                system_prompt,
                user_prompt,
                model: &completion.model,
                max_tokens: completion.max_tokens,
                temperature: completion.temperature,
            })
            .await?;

        debug!(reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}
