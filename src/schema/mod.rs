//! Schema and field type system
//!
//! This module defines the schema system for mediadex, including:
//! - Field types (Text, Keyword, Integer, Float, Date, Set)
//! - The field registry supplied at startup
//! - Coercion of feed records into declared types

mod field_type;
mod mapping;

pub use field_type::FieldType;
pub use mapping::{FieldMapping, FieldSchema};
