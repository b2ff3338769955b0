use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Language-agnostic text tokenizer: Unicode word segmentation, case
/// folding and diacritic stripping. No stemming and no stopwords.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Normalize a single word: with diacritic stripping enabled,
    /// NFKD-decompose and drop combining marks, then lowercase
    ///
    /// Compatibility forms (mathematical or fullwidth letters) decompose to
    /// uppercase ASCII, so case folding has to come after the decomposition.
    pub fn normalize(&self, word: &str) -> String {
        if !self.config.strip_diacritics {
            return word.to_lowercase();
        }
        let folded: String = word.nfkd().filter(|c| !is_combining_mark(*c)).collect();
        // Lowercasing can reintroduce marks ('İ' becomes "i\u{307}")
        folded
            .to_lowercase()
            .chars()
            .filter(|c| !is_combining_mark(*c))
            .collect()
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenize_with_positions_ordered(text)
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    /// Tokenize and return (term, position) pairs in order
    ///
    /// Positions count every word, including ones dropped by the length
    /// limits, so adjacency checks stay faithful to the source text.
    pub fn tokenize_with_positions_ordered(&self, text: &str) -> Vec<(String, u32)> {
        let mut results = Vec::new();

        for (pos, word) in text.unicode_words().enumerate() {
            let token = self.normalize(word);
            let len = token.chars().count();
            if len < self.config.min_token_length || len > self.config.max_token_length {
                continue;
            }
            results.push((token, pos as u32));
        }

        results
    }

    /// Normalize a whole keyword value (quality, format, set members) into
    /// the form used as an exact-match key
    pub fn keyword_key(&self, value: &str) -> String {
        self.normalize(value.trim())
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}
