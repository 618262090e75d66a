use crate::error::ExtractError;
use crate::extractor::extract_text;
use crate::models::StructuredRecord;
use crate::orchestrator::ResumeExtractor;
use crate::output::{output_path_for, write_new_record, write_record};
use crate::traits::{CompletionClient, OcrEngine};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Every regular file under `folder`, recursively, in sorted order.
pub fn discover_resume_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if entry.file_type().is_file() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedDocument>,
}

impl BatchReport {
    pub fn all_failed(&self) -> bool {
        self.written.is_empty() && !self.skipped.is_empty()
    }
}

/// Extraction, model calls and persistence for one or many resumes.
pub struct ResumePipeline<C>
where
    C: CompletionClient,
{
    extractor: ResumeExtractor<C>,
    ocr: Box<dyn OcrEngine>,
    result_dir: PathBuf,
}

impl<C> ResumePipeline<C>
where
    C: CompletionClient + Send + Sync,
{
    pub fn new(extractor: ResumeExtractor<C>, ocr: Box<dyn OcrEngine>, result_dir: PathBuf) -> Self {
        Self {
            extractor,
            ocr,
            result_dir,
        }
    }

    pub async fn extract_record(&self, path: &Path) -> Result<StructuredRecord, ExtractError> {
        let extracted = extract_text(path, self.ocr.as_ref())?;
        info!(
            path = %path.display(),
            kind = ?extracted.kind,
            text_len = extracted.text.len(),
            "text extracted"
        );
        self.extractor.process(&extracted.text, extracted.kind).await
    }

    /// Processes one file and returns where its record was written.
    ///
    /// An explicit `output` is overwritten. Otherwise the record lands in the
    /// result directory under a timestamped name that no earlier record holds.
    pub async fn process_file(
        &self,
        path: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf, ExtractError> {
        let record = self.extract_record(path).await?;
        match output {
            Some(explicit) => {
                write_record(&record, explicit)?;
                Ok(explicit.to_path_buf())
            }
            None => {
                let target = output_path_for(path, &self.result_dir, Local::now())?;
                write_new_record(&record, &target)
            }
        }
    }

    /// Processes files one after another; a failed file is recorded and the
    /// rest still run.
    pub async fn process_files(&self, files: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, path) in files.iter().enumerate() {
            info!(
                path = %path.display(),
                document = index + 1,
                total = files.len(),
                "processing document"
            );
            match self.process_file(path, None).await {
                Ok(written) => report.written.push(written),
                Err(error) => {
                    error!(path = %path.display(), %error, "document failed");
                    report.skipped.push(SkippedDocument {
                        path: path.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        if !report.skipped.is_empty() {
            warn!(
                skipped = report.skipped.len(),
                written = report.written.len(),
                "some documents were skipped"
            );
        }

        report
    }

    pub async fn process_directory(&self, folder: &Path) -> Result<BatchReport, ExtractError> {
        let files = discover_resume_files(folder);

        if files.is_empty() {
            return Err(ExtractError::NoDocuments(folder.display().to_string()));
        }

        Ok(self.process_files(&files).await)
    }
}
