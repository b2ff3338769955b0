//! Field type definitions
//!
//! Defines how different data types are indexed and queried.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field data type
///
/// Determines how a field is indexed and which query operators it accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text, tokenized into the postings. Equality means the value's
    /// tokens occur adjacently in the field.
    Text,
    /// Single exact value such as a quality tag or container format,
    /// compared case-insensitively.
    Keyword,
    /// 64-bit signed integer. Supports exact and range lookups.
    Integer,
    /// 64-bit floating point. Supports range lookups.
    Float,
    /// Calendar date (`YYYY-MM-DD`). Supports exact and range lookups.
    Date,
    /// Set of keywords (genres, cast, tags). Equality means membership.
    Set,
}

impl FieldType {
    /// Check if values of this type are tokenized into the term postings
    pub fn is_tokenized(&self) -> bool {
        matches!(
            self,
            FieldType::Text | FieldType::Keyword | FieldType::Set | FieldType::Integer
        )
    }

    /// Check if this field type supports exact-key lookups
    pub fn supports_exact_match(&self) -> bool {
        matches!(
            self,
            FieldType::Keyword | FieldType::Set | FieldType::Integer | FieldType::Date
        )
    }

    /// Check if this field type supports range queries
    pub fn supports_range(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float | FieldType::Date)
    }

    /// Check if this field type accepts prefix (wildcard) filters
    pub fn supports_prefix(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Keyword | FieldType::Set)
    }

    /// Check if typo tolerance may be applied to unscoped terms hitting
    /// this field
    pub fn supports_fuzzy(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Set)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Set => "set",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_by_type() {
        assert!(FieldType::Integer.supports_range());
        assert!(FieldType::Date.supports_range());
        assert!(FieldType::Float.supports_range());
        assert!(!FieldType::Text.supports_range());
        assert!(!FieldType::Keyword.supports_range());

        assert!(FieldType::Keyword.supports_exact_match());
        assert!(!FieldType::Float.supports_exact_match());

        assert!(FieldType::Text.supports_prefix());
        assert!(!FieldType::Integer.supports_prefix());

        assert!(FieldType::Text.is_tokenized());
        assert!(!FieldType::Date.is_tokenized());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&FieldType::Keyword).unwrap();
        assert_eq!(json, "\"keyword\"");
        let parsed: FieldType = serde_json::from_str("\"set\"").unwrap();
        assert_eq!(parsed, FieldType::Set);
        assert_eq!(FieldType::Date.to_string(), "date");
    }
}
