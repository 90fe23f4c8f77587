//! Splits page text into bounded, non-overlapping chunks.
//!
//! Breaks prefer, in order: the last paragraph boundary, the last sentence end,
//! the last whitespace, and finally a hard cut at the character limit. Chunks
//! never cross a page and are numbered from 0 within each page.

use crate::error::{RagError, Result};
use crate::models::{Chunk, ChunkMetadata, Page};

const SENTENCE_ENDINGS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

pub fn chunk_pages(pages: &[Page], max_chunk_chars: usize) -> Result<Vec<Chunk>> {
    if max_chunk_chars == 0 {
        return Err(RagError::Config(
            "max_chunk_chars must be greater than zero".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    for page in pages {
        if page.text.trim().is_empty() {
            log::debug!("Skipping blank page {}", page.page_number);
            continue;
        }

        let segments = split_text(&page.text, max_chunk_chars);
        chunks.extend(segments.into_iter().enumerate().map(|(idx, content)| Chunk {
            content,
            metadata: ChunkMetadata {
                page: page.page_number,
                chunk: idx as u32,
            },
        }));
    }

    if chunks.is_empty() {
        return Err(RagError::EmptyInput);
    }

    log::info!("Created {} chunks from {} pages", chunks.len(), pages.len());
    Ok(chunks)
}

/// Splits one page's text. Returned segments are non-empty, carry no trailing
/// whitespace, and hold at most `max_chars` characters.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut remaining = text.trim_start();

    while !remaining.is_empty() {
        let cut = match remaining.char_indices().nth(max_chars) {
            None => remaining.len(),
            Some((window_end, next)) => {
                let window = &remaining[..window_end];
                let cut = find_break(window, next).unwrap_or(window_end);
                cut + leading_whitespace_len(&remaining[cut..])
            }
        };

        let segment = remaining[..cut].trim_end();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        remaining = &remaining[cut..];
    }

    segments
}

/// Byte offset just past the preferred break inside `window`, if any. `next`
/// is the first character beyond the limit; when it is whitespace the window
/// itself ends on a word boundary.
fn find_break(window: &str, next: char) -> Option<usize> {
    if let Some(pos) = window.rfind("\n\n") {
        return Some(pos + 2);
    }

    let last_matching = |pred: fn(char) -> bool| {
        window
            .char_indices()
            .rev()
            .find(|(_, c)| pred(*c))
            .map(|(pos, c)| pos + c.len_utf8())
    };

    last_matching(|c| SENTENCE_ENDINGS.contains(&c)).or_else(|| {
        if next.is_whitespace() {
            Some(window.len())
        } else {
            last_matching(char::is_whitespace)
        }
    })
}

fn leading_whitespace_len(text: &str) -> usize {
    text.len() - text.trim_start().len()
}
