//! Query language
//!
//! This module turns catalogue query strings into a typed AST:
//! - Terms, phrases and trailing-`*` wildcards
//! - Field filters typed by the schema (`year:2022`, `quality:1080p`)
//! - Inclusive ranges (`year:[2020 TO *]`)
//! - Boolean combinators (NOT > AND > OR, adjacency means AND)
//!
//! # Example
//!
//! ```rust
//! use mediadex::query::{parse, QueryNode};
//! use mediadex::schema::FieldSchema;
//!
//! let schema = FieldSchema::media();
//! let query = parse("The Batman", &schema).unwrap();
//! assert!(matches!(query, QueryNode::And(..)));
//! assert!(parse("   ", &schema).unwrap().is_empty());
//! ```

pub mod ast;
pub mod query_string;

pub use ast::{FieldFilter, FilterOp, FilterValue, QueryNode};
pub use query_string::QueryStringParser;

use crate::config::QueryLimits;
use crate::error::ParseError;
use crate::schema::FieldSchema;
use crate::tokenizer::Tokenizer;

/// Parse a query string with the default tokenizer and limits
pub fn parse(query: &str, schema: &FieldSchema) -> Result<QueryNode, ParseError> {
    parse_with_tokenizer(query, schema, &Tokenizer::default(), QueryLimits::default())
}

/// Parse a query string, normalizing terms with `tokenizer` and rejecting
/// queries outside `limits`
pub fn parse_with_tokenizer(
    query: &str,
    schema: &FieldSchema,
    tokenizer: &Tokenizer,
    limits: QueryLimits,
) -> Result<QueryNode, ParseError> {
    QueryStringParser::with_limits(query, schema, tokenizer, limits)?.parse()
}
