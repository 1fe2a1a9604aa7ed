//! Header-aware chunking of Markdown-like text.
//!
//! Every `#`..`######` header opens a section that runs until the next header
//! of the same or a higher level, so a parent section also carries the text of
//! its children. Sections larger than `1.5 x target_size` are packed line by
//! line into windows of at most `target_size` characters, cutting early before
//! deep sub-headers and seeding each new window with a few trailing lines of
//! the previous one. Documents without headers fall back to plain line
//! packing.
//!
//! Lines are the atomic unit: offsets are tracked per line while splitting, so
//! every produced span is an exact byte slice of the input.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkMeta, Document};

/// Sections larger than this multiple of `target_size` are split further.
const OVERSIZE_FACTOR: f64 = 1.5;
/// A sub-header only forces a cut once the window is this full.
const SUBHEADER_CUT_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target window size in characters (newline counted once per line).
    pub target_size: usize,
    /// Maximum characters carried over from the previous window.
    pub overlap: usize,
    /// Look-back line cap for overlap when splitting an oversized section.
    pub subsection_overlap_lines: Option<usize>,
    /// Look-back line cap for overlap in the header-less fallback. `None` is unbounded.
    pub fallback_overlap_lines: Option<usize>,
    /// Headers at or below this depth may force an early cut inside a large section.
    pub min_subheader_level: u8,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: 1000,
            overlap: 200,
            subsection_overlap_lines: Some(3),
            fallback_overlap_lines: None,
            min_subheader_level: 3,
        }
    }
}

impl ChunkingConfig {
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self { target_size, overlap, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_size == 0 {
            return Err(Error::InvalidConfig("chunking.target_size must be greater than 0".to_string()));
        }
        if self.overlap >= self.target_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap ({}) must be smaller than chunking.target_size ({})",
                self.overlap, self.target_size
            )));
        }
        if !(1..=6).contains(&self.min_subheader_level) {
            return Err(Error::InvalidConfig("chunking.min_subheader_level must be within 1..=6".to_string()));
        }
        Ok(())
    }
}

/// A header line found while scanning. Only lives for the duration of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub level: u8,
    pub text: String,
    pub line: usize,
}

/// A produced chunk body with its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    text: &'a str,
    start: usize,
}

impl Line<'_> {
    fn end(&self) -> usize { self.start + self.text.len() }

    /// Characters this line contributes once joined, its newline included.
    fn size(&self) -> usize { self.text.chars().count() + 1 }
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut offset = 0;
    text.split('\n')
        .map(|line| {
            let l = Line { text: line, start: offset };
            offset += line.len() + 1;
            l
        })
        .collect()
}

fn header_level(line: &str) -> Option<u8> {
    let trimmed = line.trim_start();
    let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        u8::try_from(hashes).ok()
    } else {
        None
    }
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Header level per line; lines inside fenced code blocks never count.
fn line_levels(lines: &[Line<'_>]) -> Vec<Option<u8>> {
    let mut open_fence: Option<&str> = None;
    lines
        .iter()
        .map(|line| match (open_fence, fence_marker(line.text)) {
            (Some(open), Some(marker)) if open == marker => {
                open_fence = None;
                None
            }
            (Some(_), _) => None,
            (None, Some(marker)) => {
                open_fence = Some(marker);
                None
            }
            (None, None) => header_level(line.text),
        })
        .collect()
}

/// Scan `text` for Markdown headers outside fenced code blocks.
pub fn parse_headers(text: &str) -> Vec<Header> {
    let lines = split_lines(text);
    line_levels(&lines)
        .into_iter()
        .enumerate()
        .filter_map(|(i, level)| {
            level.map(|level| Header {
                level,
                text: lines[i].text.trim().trim_start_matches('#').trim_end_matches('#').trim().to_string(),
                line: i,
            })
        })
        .collect()
}

/// Split `text` with default look-back caps.
///
/// Never fails: nonsensical sizes degrade into one line per chunk rather than
/// an error. Use [`Chunker::new`] to have a configuration validated.
pub fn split_text(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    Chunker { config: ChunkingConfig::new(target_size, overlap) }
        .split(text)
        .into_iter()
        .map(|span| span.text)
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Split `text` into non-blank spans in document order.
    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let lines = split_lines(text);
        let levels = line_levels(&lines);
        let headers: Vec<(usize, u8)> = levels
            .iter()
            .enumerate()
            .filter_map(|(i, level)| level.map(|l| (i, l)))
            .collect();

        let ranges = if headers.is_empty() {
            self.pack(&lines, &levels, 0..lines.len(), self.config.fallback_overlap_lines, false)
        } else {
            let mut ranges = Vec::new();
            // Text ahead of the first header stays retrievable as its own section.
            let first = headers[0].0;
            if first > 0 {
                ranges.extend(self.section(&lines, &levels, 0..first));
            }
            for (pos, &(start, level)) in headers.iter().enumerate() {
                let end = headers[pos + 1..]
                    .iter()
                    .find(|&&(_, next_level)| next_level <= level)
                    .map_or(lines.len(), |&(line, _)| line);
                ranges.extend(self.section(&lines, &levels, start..end));
            }
            ranges
        };

        ranges.into_iter().filter_map(|range| to_span(text, &lines, range)).collect()
    }

    /// Chunk a document body into indexable records.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.content)
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                id: format!("{}_chunk_{}", document.id, index),
                document_id: document.id.clone(),
                content: span.text,
                chunk_index: index,
                start_pos: span.start,
                end_pos: span.end,
                language: document.language.clone(),
                category: document.category.clone(),
                metadata: ChunkMeta {
                    title: document.title.clone(),
                    tags: document.tags.clone(),
                    source_path: document.source_path.clone(),
                    extra: Default::default(),
                },
            })
            .collect()
    }

    fn section(&self, lines: &[Line<'_>], levels: &[Option<u8>], range: Range<usize>) -> Vec<Range<usize>> {
        let joined: usize = lines[range.clone()].iter().map(Line::size).sum::<usize>().saturating_sub(1);
        if joined as f64 > self.config.target_size as f64 * OVERSIZE_FACTOR {
            self.pack(lines, levels, range, self.config.subsection_overlap_lines, true)
        } else {
            vec![range]
        }
    }

    /// Greedy line packing over `range`, returning line ranges.
    fn pack(
        &self,
        lines: &[Line<'_>],
        levels: &[Option<u8>],
        range: Range<usize>,
        lookback: Option<usize>,
        cut_on_subheaders: bool,
    ) -> Vec<Range<usize>> {
        let target = self.config.target_size;
        let subheader_cut_at = target as f64 * SUBHEADER_CUT_FACTOR;
        let mut windows = Vec::new();
        let mut current = range.start;
        let mut current_size = 0usize;
        // first line of the current window that is not carried-over overlap
        let mut fresh = range.start;

        for i in range.clone() {
            let size = lines[i].size();

            let is_subheader = levels[i].is_some_and(|level| level >= self.config.min_subheader_level);
            if cut_on_subheaders && is_subheader && i > current && current_size as f64 > subheader_cut_at {
                if i > fresh {
                    windows.push(current..i);
                }
                current = i;
                fresh = i;
                current_size = 0;
            }

            if i > current && current_size + size > target {
                windows.push(current..i);
                // seed plus the incoming line must fit the target, and never restart at the old window
                let budget = self.config.overlap.min(target.saturating_sub(size));
                let floor = lookback.map_or(current + 1, |n| i.saturating_sub(n).max(current + 1));
                let mut seed = i;
                let mut seed_size = 0usize;
                while seed > floor {
                    let s = lines[seed - 1].size();
                    if seed_size + s > budget {
                        break;
                    }
                    seed -= 1;
                    seed_size += s;
                }
                current = seed;
                fresh = i;
                current_size = seed_size;
            }

            current_size += size;
        }
        if current < range.end {
            windows.push(current..range.end);
        }
        windows
    }
}

fn to_span(text: &str, lines: &[Line<'_>], range: Range<usize>) -> Option<TextSpan> {
    if range.is_empty() {
        return None;
    }
    let start = lines[range.start].start;
    let end = lines[range.end - 1].end();
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = start + (raw.len() - raw.trim_start().len());
    Some(TextSpan { text: trimmed.to_string(), start, end: start + trimmed.len() })
}
