use crate::error::ExtractError;
use crate::extractor::{join_pages, PageText};
use crate::traits::OcrEngine;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language pack, e.g. `vie` or `eng`.
    pub language: String,
    pub tesseract_path: String,
    pub pdftoppm_path: String,
    /// Rasterisation resolution for scanned PDFs.
    pub dpi: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "vie".to_string(),
            tesseract_path: "tesseract".to_string(),
            pdftoppm_path: "pdftoppm".to_string(),
            dpi: 300,
        }
    }
}

pub fn build_ocr_engine(settings: &OcrSettings) -> Box<dyn OcrEngine> {
    info!(language = %settings.language, dpi = settings.dpi, "using tesseract OCR");
    Box::new(TesseractOcr::new(settings))
}

/// Runs the `tesseract` CLI; PDFs are rasterised with `pdftoppm` first.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    tesseract_path: String,
    pdftoppm_path: String,
    language: String,
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            tesseract_path: settings.tesseract_path.clone(),
            pdftoppm_path: settings.pdftoppm_path.clone(),
            language: settings.language.clone(),
            dpi: settings.dpi,
        }
    }

    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        let prefix = out_dir.join("page");
        run_tool(
            Command::new(&self.pdftoppm_path)
                .arg("-r")
                .arg(self.dpi.to_string())
                .arg("-png")
                .arg(pdf)
                .arg(&prefix),
            &self.pdftoppm_path,
        )?;

        let mut images = fs::read_dir(out_dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect::<Vec<_>>();

        // pdftoppm zero-pads page numbers, so name order is page order.
        images.sort_unstable();
        Ok(images)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_image(&self, path: &Path) -> Result<String, ExtractError> {
        debug!(path = %path.display(), language = %self.language, "running tesseract");
        let stdout = run_tool(
            Command::new(&self.tesseract_path)
                .arg(path)
                .arg("stdout")
                .arg("-l")
                .arg(&self.language),
            &self.tesseract_path,
        )?;
        Ok(stdout.trim().to_string())
    }

    fn recognize_pdf(&self, path: &Path) -> Result<String, ExtractError> {
        let workdir = tempfile::tempdir()?;
        let images = self.rasterize(path, workdir.path())?;
        if images.is_empty() {
            return Err(ExtractError::OcrFailed(format!(
                "pdftoppm produced no pages for {}",
                path.display()
            )));
        }

        let mut pages = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let text = self.recognize_image(image)?;
            if !text.is_empty() {
                pages.push(PageText {
                    number: (index + 1) as u32,
                    text,
                });
            }
        }

        info!(path = %path.display(), pages = images.len(), "pdf OCR finished");
        Ok(join_pages(&pages))
    }
}

fn run_tool(command: &mut Command, program: &str) -> Result<String, ExtractError> {
    let output = command
        .output()
        .map_err(|error| ExtractError::OcrFailed(format!("could not run {program}: {error}")))?;

    if !output.status.success() {
        return Err(ExtractError::OcrFailed(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn settings_default_to_vietnamese_tesseract() {
        let settings = OcrSettings::default();
        assert_eq!(settings.language, "vie");
        assert_eq!(settings.tesseract_path, "tesseract");
        assert_eq!(settings.dpi, 300);
    }

    #[test]
    fn missing_tesseract_binary_is_an_ocr_failure() {
        let settings = OcrSettings {
            tesseract_path: "/nonexistent/tesseract-binary".to_string(),
            ..OcrSettings::default()
        };
        let engine = build_ocr_engine(&settings);
        match engine.recognize_image(Path::new("cv.png")) {
            Err(ExtractError::OcrFailed(message)) => {
                assert!(message.contains("could not run /nonexistent/tesseract-binary"));
            }
            other => panic!("expected OCR failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_rasterizer_fails_before_tesseract() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pdf = dir.path().join("scan.pdf");
        fs::write(&pdf, b"%PDF-1.4\n%scan")?;

        let settings = OcrSettings {
            pdftoppm_path: "/nonexistent/pdftoppm-binary".to_string(),
            ..OcrSettings::default()
        };
        match TesseractOcr::new(&settings).recognize_pdf(&pdf) {
            Err(ExtractError::OcrFailed(message)) => {
                assert!(message.contains("pdftoppm-binary"));
            }
            other => panic!("expected OCR failure, got {other:?}"),
        }
        Ok(())
    }
}
