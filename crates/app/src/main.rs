use anyhow::{bail, Context};
use chrono::Local;
use clap::{ArgGroup, Parser};
use resume_scan_core::{
    build_ocr_engine, AppConfig, OpenAiClient, ResumeExtractor, ResumePipeline,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Looked up in the working directory, in order, when `--config` is absent.
const DEFAULT_CONFIG_PATHS: [&str; 3] = ["config.toml", "config.yaml", "config.yml"];

#[derive(Parser)]
#[command(name = "resume-scan", version, about = "Extract structured JSON from resumes")]
#[command(group(ArgGroup::new("input").required(true).args(["file", "directory"])))]
struct Cli {
    /// Resume to process (.pdf, .docx, .png, .jpg, .jpeg).
    #[arg(long)]
    file: Option<PathBuf>,

    /// Folder scanned recursively for resumes.
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Explicit JSON output path for single-file mode.
    #[arg(long, requires = "file")]
    output: Option<PathBuf>,

    /// Directory for timestamped JSON results.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat model name
    #[arg(long)]
    model: Option<String>,

    /// Completion token budget
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Split documents into token-bounded chunks.
    #[arg(long, default_value_t = false)]
    chunk: bool,

    /// Token budget per chunk.
    #[arg(long)]
    chunk_max_tokens: Option<usize>,

    /// Clean the extracted text with the model before extraction.
    #[arg(long, default_value_t = false)]
    preprocess: bool,

    /// Configuration file; `.yaml`/`.yml` are read as YAML, anything else as TOML.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => match DEFAULT_CONFIG_PATHS
                .iter()
                .map(Path::new)
                .find(|path| path.is_file())
            {
                Some(path) => AppConfig::load(path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => AppConfig::default(),
            },
        };

        if let Some(api_key) = &self.api_key {
            config.llm.api_key = Some(api_key.clone());
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if self.chunk {
            config.chunking.enabled = true;
        }
        if let Some(chunk_max_tokens) = self.chunk_max_tokens {
            config.chunking.max_tokens = chunk_max_tokens;
        }
        if self.preprocess {
            config.preprocess = true;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output.result_dir = output_dir.clone();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Local::now().to_rfc3339(),
        model = %config.llm.model,
        chunking = config.chunking.enabled,
        preprocess = config.preprocess,
        "resume-scan boot"
    );

    if config.llm.api_key.is_none() {
        warn!("no API key configured; requests are sent unauthenticated");
    }

    let client = OpenAiClient::new(
        &config.llm.api_base,
        config.llm.api_key.clone(),
        config.llm.request_timeout(),
    )?;
    let extractor = ResumeExtractor::new(client, config.extraction_options())?;
    let ocr = build_ocr_engine(&config.ocr);
    let pipeline = ResumePipeline::new(extractor, ocr, config.output.result_dir.clone());

    if let Some(file) = &cli.file {
        let written = pipeline
            .process_file(file, cli.output.as_deref())
            .await
            .with_context(|| format!("failed to process {}", file.display()))?;
        println!("{}", written.display());
        return Ok(());
    }

    let Some(directory) = &cli.directory else {
        bail!("either --file or --directory is required");
    };

    let report = pipeline.process_directory(directory).await?;

    for written in &report.written {
        println!("{}", written.display());
    }
    for skipped in &report.skipped {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
    }

    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        directory = %directory.display(),
        "batch finished"
    );

    if report.all_failed() {
        bail!(
            "all {} documents in {} failed",
            report.skipped.len(),
            directory.display()
        );
    }

    Ok(())
}
