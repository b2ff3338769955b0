//! Field schema registry
//!
//! The registry is supplied at startup and fixes, for every queryable field,
//! its type and whether unscoped terms search it.

use super::field_type::FieldType;
use crate::models::{FieldMap, FieldValue};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field mapping configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field data type
    pub field_type: FieldType,

    /// Whether unscoped query terms search this field (default: true for
    /// tokenized types)
    #[serde(default)]
    pub searchable: bool,
}

impl FieldMapping {
    /// Create a new field mapping with the given type
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            searchable: field_type.is_tokenized(),
        }
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn keyword() -> Self {
        Self::new(FieldType::Keyword)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn set() -> Self {
        Self::new(FieldType::Set)
    }

    /// Set whether unscoped terms search this field
    pub fn with_searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable && self.field_type.is_tokenized();
        self
    }
}

/// Registry of field name to mapping
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    fields: BTreeMap<String, FieldMapping>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue schema for media records
    pub fn media() -> Self {
        Self::new()
            .add_field("title", FieldMapping::text())
            .add_field("description", FieldMapping::text())
            .add_field("file_name", FieldMapping::text())
            .add_field("director", FieldMapping::text())
            .add_field("channel_name", FieldMapping::text())
            .add_field("genre", FieldMapping::set())
            .add_field("cast", FieldMapping::set())
            .add_field("tags", FieldMapping::set())
            .add_field("quality", FieldMapping::keyword())
            .add_field("format", FieldMapping::keyword())
            .add_field("file_type", FieldMapping::keyword())
            .add_field("channel", FieldMapping::keyword().with_searchable(false))
            .add_field("year", FieldMapping::integer())
            .add_field("duration", FieldMapping::integer().with_searchable(false))
            .add_field("size", FieldMapping::integer().with_searchable(false))
            .add_field("rating", FieldMapping::float())
            .add_field("release_date", FieldMapping::date())
    }

    /// Register a field. Names are stored lowercase.
    pub fn add_field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.fields
            .insert(name.into().to_ascii_lowercase(), mapping);
        self
    }

    /// Look up a field by name. Only ASCII names can match.
    pub fn get(&self, name: &str) -> Option<&FieldMapping> {
        if !name.is_ascii() {
            return None;
        }
        self.fields.get(&name.to_ascii_lowercase())
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.get(name).map(|m| m.field_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldMapping)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields searched by unscoped terms
    pub fn searchable_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, m)| m.searchable)
            .map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Bring a feed record in line with the declared field types.
    ///
    /// Lossless widenings are applied (integer into a float field, a single
    /// string into a set field, an ISO date string into a date field).
    /// Unknown fields are kept on the document but never indexed.
    pub fn coerce(&self, fields: FieldMap) -> std::result::Result<FieldMap, String> {
        let mut out = FieldMap::new();
        for (name, value) in fields {
            let name = name.to_ascii_lowercase();
            let coerced = match self.field_type(&name) {
                Some(field_type) => coerce_value(&name, field_type, value)?,
                None => value,
            };
            out.insert(name, coerced);
        }
        Ok(out)
    }

    /// Convert a JSON value from a corpus file into the field's typed value
    pub fn coerce_json(
        &self,
        field: &str,
        value: &serde_json::Value,
    ) -> std::result::Result<FieldValue, String> {
        use serde_json::Value;

        let field_type = self.field_type(field).unwrap_or(FieldType::Text);
        let raw = match value {
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().ok_or_else(|| {
                    format!("field '{}': number {} out of range", field, n)
                })?),
            },
            Value::Array(items) => FieldValue::Set(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        other => Err(format!(
                            "field '{}': set elements must be strings, got {}",
                            field, other
                        )),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            Value::Bool(b) => FieldValue::Text(b.to_string()),
            Value::Null | Value::Object(_) => {
                return Err(format!("field '{}': unsupported JSON value {}", field, value))
            }
        };
        coerce_value(field, field_type, raw)
    }
}

fn coerce_value(
    name: &str,
    field_type: FieldType,
    value: FieldValue,
) -> std::result::Result<FieldValue, String> {
    let mismatch = |value: &FieldValue| {
        format!(
            "field '{}' is declared {} but got a {} value",
            name,
            field_type,
            value.type_name()
        )
    };

    match (field_type, value) {
        (FieldType::Text | FieldType::Keyword, FieldValue::Text(s)) => Ok(FieldValue::Text(s)),
        (FieldType::Text | FieldType::Keyword, FieldValue::Integer(i)) => {
            Ok(FieldValue::Text(i.to_string()))
        }
        (FieldType::Integer, FieldValue::Integer(i)) => Ok(FieldValue::Integer(i)),
        (FieldType::Integer, FieldValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| format!("field '{}': '{}' is not an integer", name, s)),
        (FieldType::Float, FieldValue::Float(f)) => {
            if f.is_finite() {
                Ok(FieldValue::Float(f))
            } else {
                Err(format!("field '{}': {} is not a finite number", name, f))
            }
        }
        (FieldType::Float, FieldValue::Integer(i)) => Ok(FieldValue::Float(i as f64)),
        (FieldType::Date, FieldValue::Date(d)) => Ok(FieldValue::Date(d)),
        (FieldType::Date, FieldValue::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|_| format!("field '{}': '{}' is not a YYYY-MM-DD date", name, s)),
        (FieldType::Set, FieldValue::Set(values)) => Ok(FieldValue::Set(values)),
        (FieldType::Set, FieldValue::Text(s)) => Ok(FieldValue::Set(vec![s])),
        (_, other) => Err(mismatch(&other)),
    }
}
