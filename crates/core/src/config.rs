//! Application configuration loaded from TOML or YAML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration. Command-line overrides are applied by the binary on
//! top of the loaded value.

use crate::error::ExtractError;
use crate::llm::DEFAULT_API_BASE;
use crate::models::{CompletionSettings, ExtractionOptions};
use crate::ocr::OcrSettings;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Completion budget accepted by `gpt-3.5-turbo`.
const GPT_35_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub chunking: ChunkingSettings,
    pub ocr: OcrSettings,
    pub output: OutputSettings,
    /// Run the cleanup prompt before extraction.
    pub preprocess: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 16_384,
            temperature: 0.0,
            request_timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Completion budget actually sent for the configured model.
    pub fn effective_max_tokens(&self) -> u32 {
        if self.model == "gpt-3.5-turbo" {
            self.max_tokens.min(GPT_35_MAX_TOKENS)
        } else {
            self.max_tokens
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub enabled: bool,
    pub max_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tokens: 16_384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub result_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            result_dir: PathBuf::from("results"),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ExtractError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ExtractError> {
        // An empty YAML document is `null`, not an empty mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// `.yaml` and `.yml` files are read as YAML, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let raw = fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml_str(&raw)
        } else {
            Self::from_toml_str(&raw)
        }
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.llm.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "llm.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.chunking.max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "chunking.max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ExtractError::InvalidConfig(format!(
                "llm.temperature must be within 0..=2, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "llm.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }
        Url::parse(&self.llm.api_base)?;
        Ok(())
    }

    pub fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            completion: CompletionSettings {
                model: self.llm.model.clone(),
                max_tokens: self.llm.effective_max_tokens(),
                temperature: self.llm.temperature,
            },
            chunking_enabled: self.chunking.enabled,
            chunk_max_tokens: self.chunking.max_tokens,
            preprocess: self.preprocess,
        }
    }
}
