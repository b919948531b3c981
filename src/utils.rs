use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

/// Reads a text file into one entry per line, trailing whitespace removed.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut lines = vec![];
    for line in reader.lines() {
        lines.push(line?.trim_end().to_string());
    }
    Ok(lines)
}

/// Number of characters (not bytes) in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Converts a character offset into a byte offset. The offset one past the
/// last character maps to `text.len()`.
pub fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    // Entity offsets come from extractors that count characters, while
    // Rust slices count bytes, so every span goes through here first
    text.char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .nth(char_idx)
}

/// Slices `text` by character offsets `[start, end)`.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let start_byte = char_to_byte(text, start)?;
    let end_byte = char_to_byte(text, end)?;
    Some(&text[start_byte..end_byte])
}
