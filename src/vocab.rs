//! Caption vocabulary utilities.
//!
//! Maps words to indices and back, with the reserved padding/start/end
//! tokens every captioning batch is built around.

use std::collections::HashMap;

/// Padding token; always index 0 so padded positions are easy to mask.
pub const NULL_TOKEN: &str = "<NULL>";
/// Start-of-caption token fed as the first sampling input.
pub const START_TOKEN: &str = "<START>";
/// End-of-caption token; decoding stops when it is produced.
pub const END_TOKEN: &str = "<END>";

/// Word vocabulary for captioning tasks.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    word_to_idx: HashMap<String, usize>,
    idx_to_word: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from a word list. The reserved tokens are placed
    /// first (`<NULL>` at index 0, then `<START>`, `<END>`); duplicates and
    /// reserved tokens in the input are skipped.
    pub fn from_words(words: &[&str]) -> Self {
        let mut idx_to_word: Vec<String> = vec![
            NULL_TOKEN.to_string(),
            START_TOKEN.to_string(),
            END_TOKEN.to_string(),
        ];
        let mut word_to_idx: HashMap<String, usize> = idx_to_word
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();

        for &word in words {
            if !word_to_idx.contains_key(word) {
                word_to_idx.insert(word.to_string(), idx_to_word.len());
                idx_to_word.push(word.to_string());
            }
        }

        Vocabulary { word_to_idx, idx_to_word }
    }

    /// Rebuild a vocabulary from a previously stored token list (used when
    /// loading a saved model). The reserved tokens must be in front.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        assert!(tokens.len() >= 3 && tokens[0] == NULL_TOKEN
                    && tokens[1] == START_TOKEN && tokens[2] == END_TOKEN,
                "token list doesn't start with the reserved tokens");

        let word_to_idx = tokens
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();

        Vocabulary { word_to_idx, idx_to_word: tokens }
    }

    /// Number of words, reserved tokens included.
    pub fn size(&self) -> usize {
        self.idx_to_word.len()
    }

    /// Full token list in index order.
    pub fn tokens(&self) -> &[String] {
        &self.idx_to_word
    }

    pub fn null_index(&self) -> usize {
        0
    }

    pub fn start_index(&self) -> usize {
        1
    }

    pub fn end_index(&self) -> usize {
        2
    }

    /// Get the index for a word.
    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.word_to_idx.get(word).copied()
    }

    /// Get the word at an index.
    pub fn word_at(&self, idx: usize) -> Option<&str> {
        self.idx_to_word.get(idx).map(|w| w.as_str())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.word_to_idx.contains_key(word)
    }

    /// Encode a whitespace-separated caption to indices, skipping unknown
    /// words.
    pub fn encode(&self, caption: &str) -> Vec<usize> {
        caption
            .split_whitespace()
            .filter_map(|word| self.index_of(word))
            .collect()
    }

    /// Encode a caption into a fixed-length training row:
    /// `<START> words... <END>` followed by `<NULL>` padding. Captions longer
    /// than `len - 2` are truncated so the end token always fits.
    pub fn encode_padded(&self, caption: &str, len: usize) -> Vec<usize> {
        assert!(len >= 2, "padded caption length {} leaves no room for start and end tokens", len);

        let mut indices = vec![self.start_index()];
        for idx in self.encode(caption).into_iter().take(len - 2) {
            indices.push(idx);
        }
        indices.push(self.end_index());
        indices.resize(len, self.null_index());
        indices
    }

    /// Decode indices back to a caption. Padding is skipped and decoding
    /// stops at the first end token.
    pub fn decode(&self, indices: &[usize]) -> String {
        let mut words = Vec::new();
        for &idx in indices {
            if idx == self.end_index() {
                break;
            }
            if idx == self.null_index() || idx == self.start_index() {
                continue;
            }
            if let Some(word) = self.word_at(idx) {
                words.push(word);
            }
        }
        words.join(" ")
    }
}
