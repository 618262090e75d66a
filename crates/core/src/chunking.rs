//! Token-bounded splitting of extracted resume text.
//!
//! Text is split at the coarsest boundary that yields pieces within the token
//! budget, and adjacent pieces are packed back together while they still fit.
//! Plain text descends paragraph, line, sentence, word. Markdown first splits
//! at headings and block elements, and keeps fenced code blocks whole.

use crate::error::ExtractError;
use crate::models::{Chunk, DocumentKind};
use regex::Regex;
use std::ops::Range;
use tiktoken_rs::{get_bpe_from_model, o200k_base, CoreBPE};
use tracing::warn;

/// Characters per word piece for alphanumeric runs.
const WORDPIECE_CHARS: usize = 4;

pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

/// Deterministic WordPiece-style estimate: every punctuation mark or CJK
/// character is one token, and each alphanumeric run costs one token per
/// started group of [`WORDPIECE_CHARS`] characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPieceCounter;

impl TokenCounter for WordPieceCounter {
    fn count(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut run = 0usize;

        for ch in text.chars() {
            if ch.is_alphanumeric() && !is_cjk(ch) {
                run += 1;
                continue;
            }

            tokens += run.div_ceil(WORDPIECE_CHARS);
            run = 0;
            if !ch.is_whitespace() {
                tokens += 1;
            }
        }

        tokens + run.div_ceil(WORDPIECE_CHARS)
    }
}

/// Exact token counts from the byte-pair encoding of an OpenAI chat model.
pub struct BpeCounter {
    bpe: CoreBPE,
}

impl BpeCounter {
    /// Tokenizer of `model`, or `o200k_base` for models tiktoken does not know.
    pub fn for_model(model: &str) -> Result<Self, ExtractError> {
        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(error) => {
                warn!(model, %error, "unknown tokenizer, using o200k_base");
                o200k_base().map_err(|error| {
                    ExtractError::InvalidChunkConfig(format!("tokenizer unavailable: {error}"))
                })?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for BpeCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch,
        '\u{3040}'..='\u{30FF}' | '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{AC00}'..='\u{D7AF}'
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Section,
    Block,
    Paragraph,
    Line,
    Sentence,
    Word,
}

const TEXT_LEVELS: &[Boundary] = &[
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

const MARKDOWN_LEVELS: &[Boundary] = &[
    Boundary::Section,
    Boundary::Block,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

#[derive(Debug, Clone)]
struct BoundaryPatterns {
    paragraph: Regex,
    line: Regex,
    sentence: Regex,
    word: Regex,
    list_item: Regex,
}

impl BoundaryPatterns {
    fn compile() -> Result<Self, ExtractError> {
        Ok(Self {
            paragraph: Regex::new(r"\n[ \t\r]*\n\s*")?,
            line: Regex::new(r"\n")?,
            sentence: Regex::new(r#"[.!?…。]+["'”’)\]]*\s+"#)?,
            word: Regex::new(r"\s+")?,
            list_item: Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])\s+\S")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Chunker<C = WordPieceCounter> {
    counter: C,
    max_tokens: usize,
    patterns: BoundaryPatterns,
}

impl Chunker<WordPieceCounter> {
    /// Chunker using the model-independent [`WordPieceCounter`] estimate.
    pub fn new(max_tokens: usize) -> Result<Self, ExtractError> {
        Self::with_counter(WordPieceCounter, max_tokens)
    }
}

impl Chunker<BpeCounter> {
    /// Chunker that measures budgets with `model`'s own tokenizer.
    pub fn for_model(model: &str, max_tokens: usize) -> Result<Self, ExtractError> {
        if max_tokens == 0 {
            return Err(ExtractError::InvalidChunkConfig(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Self::with_counter(BpeCounter::for_model(model)?, max_tokens)
    }
}

impl<C: TokenCounter> Chunker<C> {
    pub fn with_counter(counter: C, max_tokens: usize) -> Result<Self, ExtractError> {
        if max_tokens == 0 {
            return Err(ExtractError::InvalidChunkConfig(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            counter,
            max_tokens,
            patterns: BoundaryPatterns::compile()?,
        })
    }

    pub fn chunk(&self, content: &str, kind: DocumentKind) -> Vec<Chunk> {
        let (levels, atomic_fences) = match kind {
            DocumentKind::PdfLike => (TEXT_LEVELS, false),
            DocumentKind::MarkdownLike => (MARKDOWN_LEVELS, true),
        };

        let mut pieces = Vec::new();
        self.split_into(content, levels, atomic_fences, &mut pieces);

        pieces
            .into_iter()
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .enumerate()
            .map(|(index, text)| Chunk {
                index,
                text: text.to_string(),
            })
            .collect()
    }

    pub fn chunk_text(&self, content: &str) -> Vec<Chunk> {
        self.chunk(content, DocumentKind::PdfLike)
    }

    pub fn chunk_markdown(&self, content: &str) -> Vec<Chunk> {
        self.chunk(content, DocumentKind::MarkdownLike)
    }

    fn fits(&self, text: &str) -> bool {
        self.counter.count(text) <= self.max_tokens
    }

    fn split_into<'a>(
        &self,
        text: &'a str,
        levels: &[Boundary],
        atomic_fences: bool,
        out: &mut Vec<&'a str>,
    ) {
        if text.trim().is_empty() {
            return;
        }

        if self.fits(text) || (atomic_fences && is_fenced_block(text)) {
            out.push(text);
            return;
        }

        let Some((&boundary, finer)) = levels.split_first() else {
            // Nothing left to split on: emit the oversized unit whole.
            out.push(text);
            return;
        };

        let cuts = self.cut_points(text, boundary);
        if cuts.is_empty() {
            self.split_into(text, finer, atomic_fences, out);
            return;
        }

        let mut open: Option<Range<usize>> = None;
        for range in ranges_between(&cuts, text.len()) {
            open = match open {
                None => Some(range),
                Some(current) => {
                    let packed = current.start..range.end;
                    if self.fits(&text[packed.clone()]) {
                        Some(packed)
                    } else {
                        self.split_into(&text[current], finer, atomic_fences, out);
                        Some(range)
                    }
                }
            };
        }

        if let Some(current) = open {
            self.split_into(&text[current], finer, atomic_fences, out);
        }
    }

    /// Byte offsets where a new piece starts. Separators stay with the
    /// preceding piece so the pieces concatenate back to `text`.
    fn cut_points(&self, text: &str, boundary: Boundary) -> Vec<usize> {
        let cuts = match boundary {
            Boundary::Section => self.markdown_cuts(text, true),
            Boundary::Block => self.markdown_cuts(text, false),
            Boundary::Paragraph => match_ends(&self.patterns.paragraph, text),
            Boundary::Line => match_ends(&self.patterns.line, text),
            Boundary::Sentence => match_ends(&self.patterns.sentence, text),
            Boundary::Word => match_ends(&self.patterns.word, text),
        };

        cuts.into_iter()
            .filter(|&cut| cut > 0 && cut < text.len())
            .collect()
    }

    fn markdown_cuts(&self, text: &str, sections_only: bool) -> Vec<usize> {
        let mut cuts = Vec::new();
        let mut offset = 0;
        let mut in_fence = false;
        let mut force_break = false;

        for line in text.split_inclusive('\n') {
            let start = offset;
            offset += line.len();
            let trimmed = line.trim();

            if in_fence {
                if is_fence(trimmed) {
                    in_fence = false;
                    force_break = true;
                }
                continue;
            }

            if trimmed.is_empty() {
                force_break = true;
                continue;
            }

            let heading = is_heading(trimmed);
            let fence = is_fence(trimmed);
            let starts_block =
                heading || fence || force_break || self.patterns.list_item.is_match(line);

            let cut = if sections_only { heading } else { starts_block };
            if cut {
                cuts.push(start);
            }

            force_break = heading;
            if fence {
                in_fence = true;
                force_break = false;
            }
        }

        cuts
    }
}

fn match_ends(pattern: &Regex, text: &str) -> Vec<usize> {
    pattern.find_iter(text).map(|found| found.end()).collect()
}

fn ranges_between(cuts: &[usize], len: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for &cut in cuts {
        ranges.push(start..cut);
        start = cut;
    }
    ranges.push(start..len);
    ranges
}

fn is_heading(trimmed: &str) -> bool {
    let hashes = trimmed.chars().take_while(|ch| *ch == '#').count();
    (1..=6).contains(&hashes)
        && trimmed[hashes..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
}

fn is_fence(trimmed: &str) -> bool {
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// True when `text` is exactly one fenced code block, closed or running to
/// the end of the document.
fn is_fenced_block(text: &str) -> bool {
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.lines().map(str::trim).collect();
    let fences = lines.iter().filter(|line| is_fence(line)).count();

    let Some(first) = lines.first() else {
        return false;
    };
    if !is_fence(first) {
        return false;
    }

    let closed = lines.len() > 1 && lines.last().is_some_and(|line| is_fence(line));
    (closed && fences == 2) || (!closed && fences == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn sample_resume() -> String {
        let mut text = String::new();
        for section in 0..6 {
            text.push_str(&format!("Section {section} heading\n"));
            for line in 0..4 {
                text.push_str(&format!(
                    "Worked on project {section}-{line} with Rust, SQL and Kubernetes. Delivered results! "
                ));
                text.push('\n');
            }
            text.push_str("\n\n");
        }
        text
    }

    #[test]
    fn counter_splits_punctuation_and_long_words() {
        let counter = WordPieceCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("Hello, world!"), 6);
        assert_eq!(counter.count("a b c"), 3);
    }

    #[test]
    fn counter_is_deterministic() {
        let text = sample_resume();
        assert_eq!(WordPieceCounter.count(&text), WordPieceCounter.count(&text));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let error = Chunker::new(0).unwrap_err();
        assert!(matches!(error, ExtractError::InvalidChunkConfig(_)));
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunker = Chunker::new(16).unwrap();
        assert!(chunker.chunk_text("").is_empty());
        assert!(chunker.chunk_markdown("  \n\n \t").is_empty());
    }

    #[test]
    fn short_content_is_a_single_chunk() {
        let chunker = Chunker::new(1_000).unwrap();
        let chunks = chunker.chunk_text("  Alice Nguyen\nData engineer.\n");
        assert_eq!(
            chunks,
            vec![Chunk {
                index: 0,
                text: "Alice Nguyen\nData engineer.".to_string()
            }]
        );
    }

    #[test]
    fn paragraphs_are_packed_until_the_budget() {
        let chunker = Chunker::new(9).unwrap();
        let chunks = chunker.chunk_text("Alpha beta.\n\nGamma delta.\n\nEpsilon zeta.");

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["Alpha beta.\n\nGamma delta.", "Epsilon zeta."]);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn oversized_word_is_kept_whole() {
        let chunker = Chunker::new(5).unwrap();
        let word = "a".repeat(100);
        let chunks = chunker.chunk_text(&format!("short words\n\n{word}"));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "short words");
        assert_eq!(chunks[1].text, word);
    }

    #[test]
    fn chunks_cover_input_and_respect_budget() {
        let text = sample_resume();
        let counter = WordPieceCounter;

        for kind in [DocumentKind::PdfLike, DocumentKind::MarkdownLike] {
            for budget in [1, 3, 8, 25, 60, 400, 100_000] {
                let chunker = Chunker::new(budget).unwrap();
                let chunks = chunker.chunk(&text, kind);

                let joined = chunks
                    .iter()
                    .map(|chunk| chunk.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                assert_eq!(normalize_whitespace(&joined), normalize_whitespace(&text));

                for (position, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.index, position);
                    assert!(
                        counter.count(&chunk.text) <= budget
                            || !chunk.text.contains(char::is_whitespace),
                        "chunk over budget {budget}: {:?}",
                        chunk.text
                    );
                }
            }
        }
    }

    #[test]
    fn chunking_is_reproducible() {
        let text = sample_resume();
        let chunker = Chunker::new(40).unwrap();
        assert_eq!(chunker.chunk_text(&text), chunker.chunk_text(&text));
    }

    #[test]
    fn markdown_splits_at_headings() {
        let chunker = Chunker::new(10).unwrap();
        let chunks = chunker.chunk_markdown("# Skills\n- Rust\n- SQL\n\n# Education\n- BSc Physics\n");

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["# Skills\n- Rust\n- SQL", "# Education\n- BSc Physics"]);
    }

    #[test]
    fn markdown_keeps_fenced_blocks_whole() {
        let chunker = Chunker::new(6).unwrap();
        let text = "# Projects\n```\nlet a = 1;\nlet b = 2;\nlet c = 3;\n```\nShipped it.\n";
        let chunks = chunker.chunk_markdown(text);

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "# Projects",
                "```\nlet a = 1;\nlet b = 2;\nlet c = 3;\n```",
                "Shipped it."
            ]
        );
    }

    #[test]
    fn markdown_list_items_are_not_split() {
        let chunker = Chunker::new(12).unwrap();
        let text = "- Managed a team of five engineers\n- Cut costs by ten percent\n- Hired";
        let chunks = chunker.chunk_markdown(text);

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "- Managed a team of five engineers",
                "- Cut costs by ten percent\n- Hired"
            ]
        );
    }

    #[test]
    fn model_tokenizer_counts_vietnamese() {
        let counter = BpeCounter::for_model("gpt-4o-mini").unwrap();
        assert_eq!(counter.count(""), 0);
        let text = "Nguyễn Văn A, kế toán trưởng tại Công ty Cổ phần Đầu tư Hà Nội.";
        assert!(counter.count(text) > 0);
        assert_eq!(counter.count(text), counter.count(text));
    }

    #[test]
    fn unknown_model_falls_back_to_o200k() {
        let fallback = BpeCounter::for_model("in-house-llm").unwrap();
        let known = BpeCounter::for_model("gpt-4o").unwrap();
        let text = "Kinh nghiệm làm việc: 2018 - Hiện tại";
        assert_eq!(fallback.count(text), known.count(text));
    }

    #[test]
    fn model_chunks_respect_model_budget() {
        let text = "Kinh nghiệm làm việc\n\nKế toán trưởng, Công ty Cổ phần Đầu tư Hà Nội. \
                    Quản lý đội ngũ năm người. Lập báo cáo tài chính hằng quý.\n\n\
                    Học vấn\n\nCử nhân Kế toán, Đại học Kinh tế Quốc dân, 2015.";
        let chunker = Chunker::for_model("gpt-4o-mini", 12).unwrap();
        let counter = BpeCounter::for_model("gpt-4o-mini").unwrap();

        let chunks = chunker.chunk_text(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                counter.count(&chunk.text) <= 12 || !chunk.text.contains(char::is_whitespace),
                "chunk over budget: {:?}",
                chunk.text
            );
        }
        let joined = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(normalize_whitespace(&joined), normalize_whitespace(text));
    }

    #[test]
    fn model_chunker_rejects_zero_budget() {
        assert!(matches!(
            Chunker::for_model("gpt-4o-mini", 0),
            Err(ExtractError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn fence_detection() {
        assert!(is_fenced_block("```\ncode\n```"));
        assert!(is_fenced_block("~~~rust\ncode"));
        assert!(!is_fenced_block("```\ncode\n```\nprose"));
        assert!(!is_fenced_block("prose\n```\ncode\n```"));
    }
}
