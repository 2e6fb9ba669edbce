//! Paragraph-preserving chunking.
//!
//! Text is split on `\n` into paragraphs, which are packed greedily into chunks of at most
//! `max_chars` characters. Paragraphs are never split: one longer than the limit becomes a
//! chunk on its own, so the limit is advisory. Rejoining the chunks with `\n` gives back the
//! input exactly.
//!
//! Sizes count Unicode scalar values, not bytes.

use super::types::{ChunkingError, TextChunk};

/// Split `text` into ordered, 1-indexed chunks.
///
/// Empty input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<TextChunk>, ChunkingError> {
    if max_chars == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut size = 0usize;

    for paragraph in text.split('\n') {
        let paragraph_size = paragraph.chars().count();
        if size + paragraph_size + 1 > max_chars && !buffer.is_empty() {
            push_chunk(&mut chunks, &buffer);
            buffer.clear();
            buffer.push(paragraph);
            size = paragraph_size;
        } else {
            buffer.push(paragraph);
            size += paragraph_size + 1;
        }
    }

    if !buffer.is_empty() {
        push_chunk(&mut chunks, &buffer);
    }

    tracing::trace!(max_chars, chunks = chunks.len(), "Chunked text");
    Ok(chunks)
}

fn push_chunk(chunks: &mut Vec<TextChunk>, paragraphs: &[&str]) {
    chunks.push(TextChunk {
        index: chunks.len() + 1,
        text: paragraphs.join("\n"),
    });
}
