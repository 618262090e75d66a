use crate::error::ExtractError;
use crate::models::StructuredRecord;
use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const FALLBACK_STEM: &str = "resume";

/// File stem with diacritics folded away, spaces turned into underscores
/// and every other non-word character removed.
pub fn sanitize_file_stem(path: &Path) -> Result<String, ExtractError> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| ExtractError::MissingFileName(path.display().to_string()))?;

    let non_word = Regex::new(r"[^\w]")?;
    let sanitized = non_word
        .replace_all(&fold_diacritics(stem).replace(' ', "_"), "")
        .into_owned();

    if sanitized.is_empty() {
        Ok(FALLBACK_STEM.to_string())
    } else {
        Ok(sanitized)
    }
}

// `đ` has no decomposition, so it is mapped by hand.
fn fold_diacritics(text: &str) -> String {
    text.nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .map(|ch| match ch {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect()
}

/// `<dir>/<sanitized stem>_<YYYYmmddHHMMSS>.json`
pub fn output_path_for(
    source: &Path,
    result_dir: &Path,
    timestamp: DateTime<Local>,
) -> Result<PathBuf, ExtractError> {
    let stem = sanitize_file_stem(source)?;
    Ok(result_dir.join(format!("{stem}_{}.json", timestamp.format("%Y%m%d%H%M%S"))))
}

pub fn render_record(record: &StructuredRecord) -> Result<String, ExtractError> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    record.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|error| {
        ExtractError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, error))
    })
}

/// Writes the record as pretty UTF-8 JSON, creating parent directories.
pub fn write_record(record: &StructuredRecord, path: &Path) -> Result<(), ExtractError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_record(record)?)?;
    info!(path = %path.display(), fields = record.len(), "record written");
    Ok(())
}

/// Like [`write_record`], but never replaces an existing file: when `path`
/// is taken, `_1`, `_2`, ... is appended to the stem. Returns the path used.
pub fn write_new_record(record: &StructuredRecord, path: &Path) -> Result<PathBuf, ExtractError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let rendered = render_record(record)?;
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(FALLBACK_STEM);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("json");

    let mut attempt = 0usize;
    loop {
        let candidate = if attempt == 0 {
            path.to_path_buf()
        } else {
            path.with_file_name(format!("{stem}_{attempt}.{extension}"))
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(rendered.as_bytes())?;
                info!(path = %candidate.display(), fields = record.len(), "record written");
                return Ok(candidate);
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "output name taken");
                attempt += 1;
            }
            Err(error) => return Err(error.into()),
        }
    }
}
