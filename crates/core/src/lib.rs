pub mod chunking;
pub mod config;
pub mod docx;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod merge;
pub mod models;
pub mod ocr;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod prompts;
pub mod traits;

pub use chunking::{BpeCounter, Chunker, TokenCounter, WordPieceCounter};
pub use config::{AppConfig, ChunkingSettings, LlmSettings, OutputSettings};
pub use docx::docx_to_markdown;
pub use error::{ExtractError, LlmError, ParseIssue};
pub use extractor::{extract_pdf_text, extract_text, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_resume_files, BatchReport, ResumePipeline, SkippedDocument};
pub use llm::{OpenAiClient, DEFAULT_API_BASE};
pub use merge::{fold_fragments, is_empty_or_null, merge_fragment, merge_records};
pub use models::{
    Chunk, CompletionSettings, DocumentKind, ExtractedText, ExtractionOptions, ParsedValue,
    SourceFormat, StructuredRecord,
};
pub use ocr::{build_ocr_engine, OcrSettings, TesseractOcr};
pub use orchestrator::ResumeExtractor;
pub use output::{output_path_for, sanitize_file_stem, write_new_record, write_record};
pub use parser::parse_reply;
pub use traits::{CompletionClient, CompletionRequest, OcrEngine};
