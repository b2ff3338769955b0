//! Query string front end
//!
//! Supports syntax like:
//! - `batman AND year:2022`
//! - `genre:action quality:1080p` (adjacent clauses are AND-ed)
//! - `"the dark knight" OR title:bat*`
//! - `year:[2020 TO *] NOT genre:animation`
//!
//! # Example
//!
//! ```rust
//! use mediadex::query::query_string::QueryStringParser;
//! use mediadex::schema::FieldSchema;
//! use mediadex::tokenizer::Tokenizer;
//!
//! let schema = FieldSchema::media();
//! let tokenizer = Tokenizer::default();
//! let mut parser = QueryStringParser::new("batman AND year:2022", &schema, &tokenizer).unwrap();
//! let query = parser.parse().unwrap();
//! assert_eq!(query.to_string(), "batman AND year:2022");
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Spanned, Token};
pub use parser::QueryStringParser;
