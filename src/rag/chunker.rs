//! Sliding-window text chunker.
//!
//! Windows are measured in characters (Unicode scalar values), never bytes,
//! so multi-byte text is never split inside a code point.

use super::error::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Create a chunker; `chunk_overlap` must be strictly less than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Lazily iterate the windows of `text` in document order.
    ///
    /// The iterator is `Clone`, and calling `chunks` again restarts from the
    /// beginning.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            boundaries: text.char_indices().map(|(idx, _)| idx).collect(),
            size: self.chunk_size,
            step: self.chunk_size - self.chunk_overlap,
            start: 0,
            done: text.is_empty(),
        }
    }

    /// Collect the windows into owned strings.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.chunks(text).map(str::to_string).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    boundaries: Vec<usize>,
    size: usize,
    step: usize,
    start: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn byte_offset(&self, char_idx: usize) -> usize {
        self.boundaries
            .get(char_idx)
            .copied()
            .unwrap_or(self.text.len())
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let total_chars = self.boundaries.len();
        while !self.done {
            let end = (self.start + self.size).min(total_chars);
            let text = self.text;
            let window = &text[self.byte_offset(self.start)..self.byte_offset(end)];

            if end >= total_chars {
                self.done = true;
            } else {
                self.start += self.step;
            }

            let trimmed = window.trim();
            if !trimmed.is_empty() {
                return Some(trimmed);
            }
        }
        None
    }
}

/// Normalize extracted text before chunking.
///
/// Converts CRLF to LF, strips NUL characters, trims trailing whitespace on
/// every line and collapses runs of blank lines to a single blank line.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace(['\r', '\0'], "");
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in unified.lines().map(str::trim_end) {
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    lines.join("\n").trim().to_string()
}
