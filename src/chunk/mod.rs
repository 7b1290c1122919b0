//! Text chunking
//!
//! Documents are split into overlapping chunks before embedding:
//! - Separators are tried coarse to fine (paragraph, line, word, character)
//! - No chunk exceeds `max_chars` characters
//! - Neighbouring chunks share up to `overlap_chars` characters
//! - Output is deterministic for identical input and settings

use crate::config::ChunkConfig;
use blake3::Hasher;
use std::collections::VecDeque;

/// Separators tried in order; the empty separator splits into characters
const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits document text into ordered chunk strings
pub trait Splitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

/// Recursive character splitter
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    max_chars: usize,
    overlap_chars: usize,
}

impl RecursiveSplitter {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars - 1),
        }
    }

    pub fn from_config(config: &ChunkConfig) -> Self {
        Self::new(config.max_chars, config.overlap_chars)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Use the first separator present in the text; "" always matches
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.max_chars {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    /// Greedily pack small pieces into chunks, carrying a tail of the
    /// previous chunk forward as overlap
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.max_chars && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                while total > self.overlap_chars
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.max_chars)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
            total += len + joiner;
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

impl Splitter for RecursiveSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, DEFAULT_SEPARATORS)
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Compute a stable hash for document content
pub fn compute_content_hash(content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

/// Compute a stable hash for a string
pub fn compute_text_hash(text: &str) -> String {
    compute_content_hash(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter() -> RecursiveSplitter {
        RecursiveSplitter::new(100, 20)
    }

    #[test]
    fn test_chunk_short_document() {
        let chunks = splitter().split("This is a short document.");

        assert_eq!(chunks, vec!["This is a short document.".to_string()]);
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        assert!(splitter().split("").is_empty());
        assert!(splitter().split("  \n\n ").is_empty());
    }

    #[test]
    fn test_chunks_respect_max_chars() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(100);
        let chunks = splitter().split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let text = (0..60)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = splitter().split(&text);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].starts_with(last_word) || pair[1].contains(last_word),
                "expected '{}' to carry into the next chunk",
                last_word
            );
        }
    }

    #[test]
    fn test_paragraphs_split_before_words() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let text = format!("{}\n\n{}", first, second);
        let chunks = splitter().split(&text);

        assert_eq!(chunks, vec![first, second]);
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let text = "x".repeat(250);
        let chunks = RecursiveSplitter::new(100, 0).split(&text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "héllo wörld ".repeat(40);
        let chunks = splitter().split(&text);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "Rust is fast.\nRust is safe.\n\nRust is fun. ".repeat(20);
        assert_eq!(splitter().split(&text), splitter().split(&text));
    }

    #[test]
    fn test_content_hash() {
        let hash1 = compute_text_hash("hello world");
        let hash2 = compute_text_hash("hello world");
        let hash3 = compute_text_hash("different content");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }
}
