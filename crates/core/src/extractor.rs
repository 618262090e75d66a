use crate::docx::docx_to_markdown;
use crate::error::ExtractError;
use crate::models::{ExtractedText, SourceFormat};
use crate::traits::OcrEngine;
use lopdf::Document;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractError> {
        let document =
            Document::load(path).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| ExtractError::PdfParse(error.to_string()))?;

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(ExtractError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Native PDF text, or OCR output when the file has no text layer.
pub fn extract_pdf_text(path: &Path, ocr: &dyn OcrEngine) -> Result<String, ExtractError> {
    match LopdfExtractor.extract_pages(path) {
        Ok(pages) => Ok(join_pages(&pages)),
        Err(ExtractError::PdfParse(parse_error)) => {
            info!(path = %path.display(), reason = %parse_error, "no native pdf text, trying OCR");
            ocr.recognize_pdf(path).map_err(|ocr_error| {
                ExtractError::PdfParse(format!("{parse_error}; OCR fallback failed: {ocr_error}"))
            })
        }
        Err(error) => Err(error),
    }
}

/// Reads a resume and returns its text, dispatching on the file extension.
pub fn extract_text(path: &Path, ocr: &dyn OcrEngine) -> Result<ExtractedText, ExtractError> {
    let format = SourceFormat::from_path(path)?;
    info!(path = %path.display(), ?format, "extracting text");

    let text = match format {
        SourceFormat::Pdf => extract_pdf_text(path, ocr)?,
        SourceFormat::Docx => docx_to_markdown(path)?,
        SourceFormat::Image => ocr.recognize_image(path)?,
    };

    if text.trim().is_empty() {
        warn!(path = %path.display(), "extracted text is empty");
    }

    Ok(ExtractedText {
        format,
        kind: format.document_kind(),
        text,
    })
}

pub(crate) fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeOcr {
        pdf_calls: AtomicUsize,
        image_calls: AtomicUsize,
        fail: bool,
    }

    impl OcrEngine for FakeOcr {
        fn recognize_image(&self, _path: &Path) -> Result<String, ExtractError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            Ok("# Alice\n- Rust".to_string())
        }

        fn recognize_pdf(&self, _path: &Path) -> Result<String, ExtractError> {
            self.pdf_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ExtractError::OcrFailed("tesseract missing".to_string()))
            } else {
                Ok("scanned text".to_string())
            }
        }
    }

    #[test]
    fn pages_join_with_blank_lines() {
        let pages = vec![
            PageText {
                number: 1,
                text: " first page \n".to_string(),
            },
            PageText {
                number: 2,
                text: "second page".to_string(),
            },
        ];
        assert_eq!(join_pages(&pages), "first page\n\nsecond page");
    }

    #[test]
    fn unreadable_pdf_falls_back_to_ocr() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("scan.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let ocr = FakeOcr::default();
        let extracted = extract_text(&path, &ocr)?;

        assert_eq!(extracted.text, "scanned text");
        assert_eq!(extracted.format, SourceFormat::Pdf);
        assert_eq!(extracted.kind, DocumentKind::PdfLike);
        assert_eq!(ocr.pdf_calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn ocr_failure_is_reported_with_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("scan.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let ocr = FakeOcr {
            fail: true,
            ..FakeOcr::default()
        };
        match extract_text(&path, &ocr) {
            Err(ExtractError::PdfParse(message)) => {
                assert!(message.contains("OCR fallback failed"));
                assert!(message.contains("tesseract missing"));
            }
            other => panic!("expected pdf parse error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn images_go_through_ocr_as_markdown() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("cv.PNG");
        fs::write(&path, b"not really a png")?;

        let ocr = FakeOcr::default();
        let extracted = extract_text(&path, &ocr)?;

        assert_eq!(extracted.kind, DocumentKind::MarkdownLike);
        assert_eq!(ocr.image_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ocr.pdf_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let ocr = FakeOcr::default();
        let result = extract_text(Path::new("/tmp/cv.odt"), &ocr);
        assert!(matches!(result, Err(ExtractError::UnsupportedFileType(_))));
        assert_eq!(ocr.image_calls.load(Ordering::SeqCst) + ocr.pdf_calls.load(Ordering::SeqCst), 0);
    }
}
