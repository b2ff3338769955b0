use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backend::BackendKind;
use crate::error::{MediadexError, Result};

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tokenizer: TokenizerConfig,
    pub fuzzy: FuzzyConfig,
    pub boosts: BoostConfig,
    pub query_limits: QueryLimits,
    /// Backend fallback chain, primary first
    pub backends: Vec<BackendKind>,
    /// Records pulled from the canonical store per rebuild batch
    pub rebuild_batch_size: usize,
    /// Mutations the persisted snapshot may lag behind the canonical store
    /// before startup forces a full rebuild
    pub staleness_threshold: u64,
    /// Result limit used when the caller does not supply one
    pub results_limit: usize,
    /// Where the active snapshot is persisted, if anywhere
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            fuzzy: FuzzyConfig::default(),
            boosts: BoostConfig::default(),
            query_limits: QueryLimits::default(),
            backends: vec![BackendKind::Inverted, BackendKind::Substring],
            rebuild_batch_size: 100,
            staleness_threshold: 1_000,
            results_limit: 50,
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    /// Set the backend fallback chain
    pub fn with_backends(mut self, backends: Vec<BackendKind>) -> Self {
        self.backends = backends;
        self
    }

    /// Set the rebuild batch size
    pub fn with_rebuild_batch_size(mut self, batch_size: usize) -> Self {
        self.rebuild_batch_size = batch_size;
        self
    }

    /// Set the staleness threshold
    pub fn with_staleness_threshold(mut self, threshold: u64) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    /// Set the default results limit
    pub fn with_results_limit(mut self, limit: usize) -> Self {
        self.results_limit = limit;
        self
    }

    /// Set the bounds on accepted query strings
    pub fn with_query_limits(mut self, limits: QueryLimits) -> Self {
        self.query_limits = limits;
        self
    }

    /// Persist published snapshots to this file
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(MediadexError::Config(
                "backend chain must name at least one backend".to_string(),
            ));
        }
        if self.rebuild_batch_size == 0 {
            return Err(MediadexError::Config(
                "rebuild_batch_size must be positive".to_string(),
            ));
        }
        if self.query_limits.max_length == 0 || self.query_limits.max_depth == 0 {
            return Err(MediadexError::Config(
                "query limits must be positive".to_string(),
            ));
        }
        if self.tokenizer.min_token_length > self.tokenizer.max_token_length {
            return Err(MediadexError::Config(format!(
                "min_token_length {} exceeds max_token_length {}",
                self.tokenizer.min_token_length, self.tokenizer.max_token_length
            )));
        }
        Ok(())
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Fold accented characters to their base letter
    pub strip_diacritics: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            strip_diacritics: true,
            min_token_length: 1,
            max_token_length: 64,
        }
    }
}

/// Bounds on query strings accepted by the parser
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Longest accepted query, in characters
    pub max_length: usize,
    /// Deepest accepted nesting of parentheses and NOT operators
    pub max_depth: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_length: 1_024,
            max_depth: 32,
        }
    }
}

/// Typo tolerance settings for term and wildcard matching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// Hard cap on the edit distance
    pub max_distance: u32,
    /// Tokens shorter than this must match exactly
    pub one_edit_min_length: usize,
    /// Tokens at least this long tolerate two edits
    pub two_edits_min_length: usize,
    /// Maximum dictionary terms a single fuzzy lookup may expand to
    pub max_expansions: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            max_distance: 2,
            one_edit_min_length: 3,
            two_edits_min_length: 6,
            max_expansions: 50,
        }
    }
}

impl FuzzyConfig {
    /// Edit distance allowed for a token of `len` characters
    pub fn allowed_distance(&self, len: usize) -> u32 {
        let by_length = if len >= self.two_edits_min_length {
            2
        } else if len >= self.one_edit_min_length {
            1
        } else {
            0
        };
        by_length.min(self.max_distance)
    }
}

/// Domain boosts, each expressed as a percentage increase
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoostConfig {
    pub exact_title_percent: f32,
    /// Quality value (lowercase) to boost percentage
    pub quality: Vec<(String, f32)>,
    /// Container format (lowercase) to boost percentage
    pub format: Vec<(String, f32)>,
    /// Leading title words ignored when comparing titles
    pub ignored_title_articles: Vec<String>,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            exact_title_percent: 30.0,
            quality: vec![
                ("4k".to_string(), 20.0),
                ("uhd".to_string(), 20.0),
                ("1080p".to_string(), 10.0),
            ],
            format: vec![("mp4".to_string(), 10.0), ("mkv".to_string(), 5.0)],
            ignored_title_articles: vec!["the".to_string(), "a".to_string(), "an".to_string()],
        }
    }
}
