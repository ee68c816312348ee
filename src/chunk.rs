//! Heading-aware segmentation and small-chunk merging.
//!
//! Splits a document into titled [`Chunk`]s. Two input shapes are supported:
//!
//! - **Text** (scraped web pages, markdown): code-like runs are fenced first,
//!   then the text is cut at ATX headings (`#` … `######`) that sit outside
//!   fences. Text with no headings is cut into blank-line paragraphs instead.
//! - **Line records** (PDF extraction): wrapped lines are rejoined, then each
//!   line is classified as heading or body using a configurable pattern set,
//!   an all-caps rule, and a font-size gate at a percentile of the observed
//!   sizes. Each heading starts a chunk rendered as `## {heading}` plus its
//!   body.
//!
//! Every chunk is finalized through [`markdown::postprocess`]. Line-record
//! documents then go through [`merge_small_chunks`], which folds undersized
//! chunks into their predecessor. Text documents keep one chunk per heading.
//!
//! Segmentation never fails: empty or malformed input yields no chunks.

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::config::{Config, SegmentationConfig};
use crate::fence::{CodeRules, FenceMode};
use crate::markdown::{self, is_atx_heading, is_fence_delimiter};
use crate::models::{Chunk, ChunkMetadata, Document, DocumentContent, DocumentMetadata, LineRecord};

/// Two font sizes closer than this are the same size.
const FONT_SIZE_EPSILON: f64 = 0.01;

/// Compiled heading and garbage-line patterns for paged sources.
#[derive(Debug, Clone)]
pub struct HeadingRules {
    patterns: Vec<Regex>,
    garbage: Vec<Regex>,
    percentile: f64,
    keep_preamble: bool,
}

impl HeadingRules {
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        let patterns = compile_all(&config.heading_patterns, "heading")?;
        let garbage = compile_all(&config.garbage_patterns, "garbage line")?;
        Ok(Self {
            patterns,
            garbage,
            percentile: config.heading_percentile,
            keep_preamble: config.keep_preamble,
        })
    }

    /// Whether a trimmed line is a heading given its font size and the
    /// document's heading threshold (`None` disables the font gate).
    pub fn is_heading(&self, text: &str, font_size: f64, threshold: Option<f64>) -> bool {
        let passes_font_gate = match threshold {
            None => true,
            Some(t) => font_size <= 0.0 || font_size >= t,
        };
        passes_font_gate
            && (self.patterns.iter().any(|p| p.is_match(text)) || is_all_caps_heading(text))
    }

    pub fn is_garbage(&self, text: &str) -> bool {
        if self.garbage.is_empty() {
            return false;
        }
        let lower = text.trim().to_lowercase();
        self.garbage.iter().any(|p| p.is_match(&lower))
    }
}

fn compile_all(patterns: &[String], what: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).with_context(|| format!("failed to compile {} pattern: {}", what, p))
        })
        .collect()
}

/// At least two words whose letters are all upper case.
fn is_all_caps_heading(text: &str) -> bool {
    if text.split_whitespace().count() < 2 {
        return false;
    }
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

/// Font size at `percentile` of all positive sizes, or `None` when no line
/// carries a size.
pub fn heading_font_threshold(lines: &[LineRecord], percentile: f64) -> Option<f64> {
    let mut sizes: Vec<f64> = lines
        .iter()
        .map(|l| l.font_size)
        .filter(|s| s.is_finite() && *s > 0.0)
        .collect();
    if sizes.is_empty() {
        return None;
    }
    sizes.sort_by(f64::total_cmp);
    let index = ((percentile * sizes.len() as f64) as usize).min(sizes.len() - 1);
    Some(sizes[index])
}

/// Repair line-wrap artifacts from PDF extraction.
///
/// Records with embedded newlines are split into one record per line. A line
/// is then appended to its predecessor (joined by a space) when the
/// predecessor ends in an alphanumeric character, the line starts with a
/// lowercase letter or digit, and both share a font size. Blank lines are
/// dropped.
pub fn join_wrapped_lines(lines: &[LineRecord]) -> Vec<LineRecord> {
    let mut out: Vec<LineRecord> = Vec::with_capacity(lines.len());

    for record in lines {
        for piece in record.text.split('\n') {
            let piece = piece.trim_end_matches('\r');
            if piece.trim().is_empty() {
                continue;
            }
            if let Some(prev) = out.last_mut() {
                if continues_line(prev, piece, record.font_size) {
                    let joined = format!("{} {}", prev.text.trim_end(), piece.trim_start());
                    prev.text = joined;
                    continue;
                }
            }
            out.push(LineRecord {
                text: piece.to_string(),
                ..record.clone()
            });
        }
    }

    out
}

fn continues_line(prev: &LineRecord, next: &str, next_font_size: f64) -> bool {
    (prev.font_size - next_font_size).abs() < FONT_SIZE_EPSILON
        && prev
            .text
            .trim_end()
            .chars()
            .last()
            .is_some_and(char::is_alphanumeric)
        && next
            .trim_start()
            .chars()
            .next()
            .is_some_and(|c| c.is_lowercase() || c.is_ascii_digit())
}

/// Splits documents into finalized chunks.
#[derive(Debug, Clone)]
pub struct Segmenter {
    headings: HeadingRules,
    code: CodeRules,
    min_chunk_chars: usize,
}

impl Segmenter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            headings: HeadingRules::new(&config.segmentation)?,
            code: CodeRules::new(&config.code)?,
            min_chunk_chars: config.segmentation.min_chunk_chars,
        })
    }

    /// Segment a document, merging small chunks of line-record input.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chunks = self.segment(document);
        if !matches!(document.content, DocumentContent::Lines(_)) {
            debug!(segmented = chunks.len(), "chunked text document");
            return chunks;
        }
        let segmented = chunks.len();
        let merged = merge_small_chunks(chunks, self.min_chunk_chars);
        debug!(segmented, merged = merged.len(), "chunked line document");
        merged
    }

    /// Segment without merging.
    pub fn segment(&self, document: &Document) -> Vec<Chunk> {
        match &document.content {
            DocumentContent::Text(text) => self.segment_text(text, &document.metadata),
            DocumentContent::Lines(lines) => self.segment_lines(lines, &document.metadata),
        }
    }

    /// Web variant: fence, cut at headings (or paragraphs), postprocess.
    pub fn segment_text(&self, text: &str, metadata: &DocumentMetadata) -> Vec<Chunk> {
        let normalized = self.code.normalize(text, FenceMode::Web);
        let sections = split_at_headings(&normalized)
            .unwrap_or_else(|| split_paragraphs(&normalized));

        sections
            .iter()
            .map(|section| markdown::postprocess(section.trim()))
            .filter(|content| !content.is_empty())
            .map(|content| Chunk::new(content, ChunkMetadata::from(metadata)))
            .collect()
    }

    /// PDF variant: join wrapped lines, classify headings, emit titled chunks.
    pub fn segment_lines(&self, lines: &[LineRecord], metadata: &DocumentMetadata) -> Vec<Chunk> {
        let lines = join_wrapped_lines(lines);
        let threshold = heading_font_threshold(&lines, self.headings.percentile);
        debug!(lines = lines.len(), ?threshold, "segmenting line records");

        let kept: Vec<&LineRecord> = lines
            .iter()
            .filter(|l| !self.headings.is_garbage(&l.text))
            .collect();

        let mut chunks = Vec::new();
        let mut title: Option<String> = None;
        let mut body: Vec<&str> = Vec::new();
        let mut saw_heading = false;

        for line in &kept {
            let text = line.text.trim();
            if self.headings.is_heading(text, line.font_size, threshold) {
                if title.is_some() || self.headings.keep_preamble {
                    self.push_section(title.take(), &body, metadata, &mut chunks);
                }
                body.clear();
                title = Some(text.to_string());
                saw_heading = true;
            } else {
                body.push(line.text.trim_end());
            }
        }

        if saw_heading {
            self.push_section(title, &body, metadata, &mut chunks);
        } else {
            let all: Vec<&str> = kept.iter().map(|l| l.text.trim_end()).collect();
            self.push_section(None, &all, metadata, &mut chunks);
        }

        chunks
    }

    fn push_section(
        &self,
        title: Option<String>,
        body: &[&str],
        metadata: &DocumentMetadata,
        chunks: &mut Vec<Chunk>,
    ) {
        let normalized = self.code.normalize(&body.join("\n"), FenceMode::Pdf);
        let processed = markdown::postprocess(&normalized);
        if processed.is_empty() {
            return;
        }
        let content = match title {
            Some(title) => format!("## {}\n\n{}", title, processed),
            None => processed,
        };
        chunks.push(Chunk::new(content, ChunkMetadata::from(metadata)));
    }
}

/// Cut text at ATX headings outside fences. Returns `None` when there are no
/// headings. Non-blank text before the first heading becomes its own section.
fn split_at_headings(text: &str) -> Option<Vec<String>> {
    let mut sections: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut found = false;

    for line in text.lines() {
        if is_fence_delimiter(line) {
            in_fence = !in_fence;
        } else if !in_fence && is_atx_heading(line) {
            found = true;
            flush_section(&mut current, &mut sections);
        }
        current.push(line);
    }
    flush_section(&mut current, &mut sections);

    found.then_some(sections)
}

/// Cut text at blank lines outside fences.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if is_fence_delimiter(line) {
            in_fence = !in_fence;
        } else if !in_fence && line.trim().is_empty() {
            flush_section(&mut current, &mut paragraphs);
            continue;
        }
        current.push(line);
    }
    flush_section(&mut current, &mut paragraphs);

    paragraphs
}

fn flush_section(current: &mut Vec<&str>, sections: &mut Vec<String>) {
    let joined = current.join("\n");
    current.clear();
    if !joined.trim().is_empty() {
        sections.push(joined);
    }
}

/// Fold every chunk after the first that is shorter than `min_chars` into
/// the chunk emitted before it. The surviving chunk keeps its id and
/// metadata; order is preserved.
pub fn merge_small_chunks(chunks: Vec<Chunk>, min_chars: usize) -> Vec<Chunk> {
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match merged.last_mut() {
            Some(prev) if chunk.char_len() < min_chars => {
                let content = format!("{}\n\n{}", prev.content, chunk.content);
                prev.set_content(content);
            }
            _ => merged.push(chunk),
        }
    }

    for chunk in &mut merged {
        let processed = markdown::postprocess(&chunk.content);
        if processed != chunk.content {
            chunk.set_content(processed);
        }
    }

    merged
}
