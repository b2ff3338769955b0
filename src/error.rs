use thiserror::Error;

/// Query syntax errors, always carrying the offending token and its
/// character position in the query string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error at position {position} near '{token}': {message}")]
    Syntax {
        token: String,
        position: usize,
        message: String,
    },

    #[error("unknown field '{token}' at position {position}")]
    UnknownField { token: String, position: usize },

    #[error("invalid range for field '{field}' at position {position} near '{token}': {message}")]
    InvalidRange {
        field: String,
        token: String,
        position: usize,
        message: String,
    },

    #[error("invalid value for field '{field}' at position {position} near '{token}': {message}")]
    InvalidValue {
        field: String,
        token: String,
        position: usize,
        message: String,
    },
}

impl ParseError {
    pub fn syntax(token: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            token: token.into(),
            position,
            message: message.into(),
        }
    }

    /// Character offset of the offending token
    pub fn position(&self) -> usize {
        match self {
            ParseError::Syntax { position, .. }
            | ParseError::UnknownField { position, .. }
            | ParseError::InvalidRange { position, .. }
            | ParseError::InvalidValue { position, .. } => *position,
        }
    }

    /// The offending token as written by the caller
    pub fn token(&self) -> &str {
        match self {
            ParseError::Syntax { token, .. }
            | ParseError::UnknownField { token, .. }
            | ParseError::InvalidRange { token, .. }
            | ParseError::InvalidValue { token, .. } => token,
        }
    }
}

/// Main error type for mediadex operations
#[derive(Error, Debug)]
pub enum MediadexError {
    #[error("Query parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Search unavailable: all backends failed ({})", attempted.join(", "))]
    SearchUnavailable { attempted: Vec<String> },

    #[error("Rebuild failed: {0}")]
    RebuildFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("Document source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: incompatible version {actual}, expected <= {expected}")]
    IncompatibleSnapshot { expected: u32, actual: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Index not ready: {0}")]
    NotReady(String),

    #[error("Document feed is closed")]
    FeedClosed,
}

/// Result type alias for mediadex operations
pub type Result<T> = std::result::Result<T, MediadexError>;

impl MediadexError {
    /// Check if this error indicates a transient failure the caller may retry
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            MediadexError::SearchUnavailable { .. }
                | MediadexError::RebuildFailed(_)
                | MediadexError::Source(_)
                | MediadexError::NotReady(_)
        )
    }

    /// Whether the error stems from a malformed query
    pub fn is_parse_error(&self) -> bool {
        matches!(self, MediadexError::Parse(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediadexError::SearchUnavailable {
            attempted: vec!["inverted".to_string(), "substring".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Search unavailable: all backends failed (inverted, substring)"
        );
    }

    #[test]
    fn test_parse_error_accessors() {
        let err = ParseError::syntax("AND", 6, "missing operand");
        assert_eq!(err.position(), 6);
        assert_eq!(err.token(), "AND");

        let err = ParseError::UnknownField {
            token: "colour".to_string(),
            position: 0,
        };
        assert_eq!(err.to_string(), "unknown field 'colour' at position 0");
    }

    #[test]
    fn test_retriable_errors() {
        assert!(MediadexError::SearchUnavailable { attempted: vec![] }.is_retriable());
        assert!(MediadexError::RebuildFailed("boom".to_string()).is_retriable());
        assert!(!MediadexError::Cancelled.is_retriable());
        assert!(!MediadexError::from(ParseError::syntax("(", 0, "unbalanced")).is_retriable());
    }
}
