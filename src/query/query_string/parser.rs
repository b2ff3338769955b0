//! Recursive descent parser for query strings
//!
//! # Grammar
//!
//! ```text
//! query       := or_expr | <empty>
//! or_expr     := and_expr (OR and_expr)*
//! and_expr    := not_expr (AND? not_expr)*
//! not_expr    := NOT not_expr | primary
//! primary     := field_query | grouped | QUOTED | WORD
//! field_query := WORD COLON (range | QUOTED | WORD)
//! range       := '[' bound TO bound ']'
//! bound       := WORD | '*'
//! grouped     := '(' or_expr ')'
//! ```
//!
//! Words and phrases are normalized with the engine tokenizer; field values
//! are typed by the field's declared type in the schema. Query length and
//! the nesting depth of `(` and `NOT` are bounded by [`QueryLimits`].

use super::lexer::{Lexer, Spanned, Token};
use crate::config::QueryLimits;
use crate::error::ParseError;
use crate::query::ast::{FieldFilter, FilterOp, FilterValue, QueryNode};
use crate::schema::{FieldSchema, FieldType};
use crate::tokenizer::Tokenizer;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Parser for the catalogue query language
pub struct QueryStringParser<'a> {
    lexer: Lexer,
    current: Spanned,
    schema: &'a FieldSchema,
    tokenizer: &'a Tokenizer,
    limits: QueryLimits,
    depth: usize,
}

impl<'a> QueryStringParser<'a> {
    /// Create a new parser for the given query string with default limits
    pub fn new(
        input: &str,
        schema: &'a FieldSchema,
        tokenizer: &'a Tokenizer,
    ) -> Result<Self, ParseError> {
        Self::with_limits(input, schema, tokenizer, QueryLimits::default())
    }

    /// Create a parser that rejects queries outside `limits`
    pub fn with_limits(
        input: &str,
        schema: &'a FieldSchema,
        tokenizer: &'a Tokenizer,
        limits: QueryLimits,
    ) -> Result<Self, ParseError> {
        if let Some(overflow) = input.chars().nth(limits.max_length) {
            return Err(ParseError::syntax(
                overflow.to_string(),
                limits.max_length,
                format!("query is longer than {} characters", limits.max_length),
            ));
        }

        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;

        Ok(Self {
            lexer,
            current,
            schema,
            tokenizer,
            limits,
            depth: 0,
        })
    }

    /// Parse the query string into a query AST
    pub fn parse(&mut self) -> Result<QueryNode, ParseError> {
        if self.current.token == Token::Eof {
            return Ok(QueryNode::Empty);
        }

        let query = self.parse_or_expr()?;

        match self.current.token {
            Token::Eof => Ok(query),
            Token::RightParen => Err(self.error_here("unbalanced parenthesis: no matching '('")),
            _ => Err(self.error_here("unexpected token")),
        }
    }

    /// Parse: or_expr := and_expr (OR and_expr)*
    fn parse_or_expr(&mut self) -> Result<QueryNode, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.current.token == Token::Or {
            let op = self.advance()?;
            self.expect_right_operand(&op)?;
            let right = self.parse_and_expr()?;
            left = QueryNode::or(left, right);
        }

        Ok(left)
    }

    /// Parse: and_expr := not_expr (AND? not_expr)*
    fn parse_and_expr(&mut self) -> Result<QueryNode, ParseError> {
        let mut left = self.parse_not_expr()?;

        loop {
            if self.current.token == Token::And {
                let op = self.advance()?;
                self.expect_right_operand(&op)?;
            } else if !self.current.token.starts_operand() {
                break;
            }
            let right = self.parse_not_expr()?;
            left = QueryNode::and(left, right);
        }

        Ok(left)
    }

    /// Parse: not_expr := NOT not_expr | primary
    fn parse_not_expr(&mut self) -> Result<QueryNode, ParseError> {
        if self.current.token == Token::Not {
            self.descend()?;
            let op = self.advance()?;
            self.expect_right_operand(&op)?;
            let inner = self.parse_not_expr()?;
            self.depth -= 1;
            return Ok(QueryNode::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryNode, ParseError> {
        match self.current.token.clone() {
            Token::LeftParen => {
                self.descend()?;
                let open = self.advance()?;
                if self.current.token == Token::RightParen {
                    return Err(self.error_here("empty parentheses"));
                }
                let inner = self.parse_or_expr()?;
                if self.current.token != Token::RightParen {
                    return Err(ParseError::syntax(
                        open.text,
                        open.position,
                        "unbalanced parenthesis: missing ')'",
                    ));
                }
                self.advance()?;
                self.depth -= 1;
                Ok(inner)
            }
            Token::Quoted(text) => {
                let quoted = self.advance()?;
                self.text_node(&text, &quoted)
            }
            Token::Word(word) => {
                let spanned = self.advance()?;
                if self.current.token == Token::Colon {
                    self.advance()?;
                    return self.parse_field_query(&word, spanned.position);
                }
                self.word_node(&word, &spanned)
            }
            // A stray TO outside a range is an ordinary word
            Token::To => {
                let spanned = self.advance()?;
                self.word_node(&spanned.text, &spanned)
            }
            Token::And | Token::Or => Err(self.error_here(format!(
                "operator '{}' is missing its left operand",
                self.current.text
            ))),
            Token::Not => self.parse_not_expr(),
            Token::Colon => Err(self.error_here("expected a field name before ':'")),
            Token::RightParen => Err(self.error_here("unbalanced parenthesis: no matching '('")),
            Token::LeftBracket | Token::RightBracket => {
                Err(self.error_here("range brackets must follow a field name"))
            }
            Token::Eof => Err(self.error_here("unexpected end of query")),
        }
    }

    /// Parse the value after `field:`
    fn parse_field_query(&mut self, name: &str, name_position: usize) -> Result<QueryNode, ParseError> {
        let mapping = self
            .schema
            .get(name)
            .ok_or_else(|| ParseError::UnknownField {
                token: name.to_string(),
                position: name_position,
            })?;
        let field = name.to_ascii_lowercase();
        let field_type = mapping.field_type;

        match self.current.token.clone() {
            Token::LeftBracket => self.parse_range(field, field_type),
            Token::Quoted(text) => {
                let value = self.advance()?;
                let filter_value = self.eq_value(&field, field_type, &text, &value)?;
                Ok(field_eq(field, filter_value))
            }
            Token::Word(word) => {
                let value = self.advance()?;
                if let Some(prefix) = wildcard_prefix(&word) {
                    return self.field_wildcard(field, field_type, prefix, &value);
                }
                if word.contains('*') {
                    return Err(invalid_value(
                        &field,
                        &value,
                        "only a single trailing '*' wildcard is supported",
                    ));
                }
                let filter_value = self.eq_value(&field, field_type, &word, &value)?;
                Ok(field_eq(field, filter_value))
            }
            Token::To => {
                let value = self.advance()?;
                let filter_value = self.eq_value(&field, field_type, &value.text, &value)?;
                Ok(field_eq(field, filter_value))
            }
            Token::And | Token::Or | Token::Not => Err(self.error_here(format!(
                "expected a value for field '{}' but found operator '{}'",
                field, self.current.text
            ))),
            _ => Err(self.error_here(format!("expected a value after '{}:'", field))),
        }
    }

    /// Parse: range := '[' bound TO bound ']'
    fn parse_range(&mut self, field: String, field_type: FieldType) -> Result<QueryNode, ParseError> {
        let open = self.advance()?;
        if !field_type.supports_range() {
            return Err(invalid_range(
                &field,
                &open,
                format!("{} field '{}' does not support ranges", field_type, field),
            ));
        }

        let low = self.parse_bound(&field, field_type)?;
        if self.current.token != Token::To {
            return Err(invalid_range(&field, &self.current, "expected 'TO'"));
        }
        self.advance()?;
        let high = self.parse_bound(&field, field_type)?;
        if self.current.token != Token::RightBracket {
            return Err(invalid_range(&field, &self.current, "expected ']'"));
        }
        self.advance()?;

        if let (Some(lo), Some(hi)) = (&low, &high) {
            if lo.partial_cmp_value(hi) == Some(Ordering::Greater) {
                return Err(invalid_range(
                    &field,
                    &open,
                    format!("lower bound {} exceeds upper bound {}", lo, hi),
                ));
            }
        }

        Ok(QueryNode::Field(FieldFilter {
            field,
            op: FilterOp::Range { low, high },
        }))
    }

    fn parse_bound(
        &mut self,
        field: &str,
        field_type: FieldType,
    ) -> Result<Option<FilterValue>, ParseError> {
        let Token::Word(word) = self.current.token.clone() else {
            return Err(invalid_range(field, &self.current, "expected a range bound"));
        };
        let bound = self.advance()?;
        if word == "*" {
            return Ok(None);
        }
        parse_typed(field_type, &word)
            .map(Some)
            .ok_or_else(|| {
                invalid_range(
                    field,
                    &bound,
                    format!("'{}' is not a valid {} bound", word, field_type),
                )
            })
    }

    /// Type an equality operand by the field's declared type
    fn eq_value(
        &self,
        field: &str,
        field_type: FieldType,
        raw: &str,
        at: &Spanned,
    ) -> Result<FilterValue, ParseError> {
        match field_type {
            FieldType::Text => {
                let tokens = self.tokenizer.tokenize(raw);
                if tokens.is_empty() {
                    return Err(invalid_value(field, at, "value contains no searchable characters"));
                }
                Ok(FilterValue::Text(tokens))
            }
            FieldType::Keyword | FieldType::Set => {
                let key = self.tokenizer.keyword_key(raw);
                if key.is_empty() {
                    return Err(invalid_value(field, at, "value must not be empty"));
                }
                Ok(FilterValue::Keyword(key))
            }
            FieldType::Integer | FieldType::Float | FieldType::Date => {
                parse_typed(field_type, raw.trim()).ok_or_else(|| {
                    invalid_value(field, at, format!("'{}' is not a valid {}", raw, field_type))
                })
            }
        }
    }

    fn field_wildcard(
        &self,
        field: String,
        field_type: FieldType,
        prefix: &str,
        at: &Spanned,
    ) -> Result<QueryNode, ParseError> {
        if !field_type.supports_prefix() {
            return Err(invalid_value(
                &field,
                at,
                format!("{} field '{}' does not support wildcards", field_type, field),
            ));
        }
        let prefix = if field_type == FieldType::Text {
            let mut tokens = self.tokenizer.tokenize(prefix);
            if tokens.len() != 1 {
                return Err(invalid_value(&field, at, "wildcard prefix must be a single word"));
            }
            tokens.remove(0)
        } else {
            self.tokenizer.keyword_key(prefix)
        };
        Ok(QueryNode::Wildcard {
            field: Some(field),
            prefix,
        })
    }

    /// Bare word: term, multi-token phrase or unscoped wildcard
    fn word_node(&self, word: &str, at: &Spanned) -> Result<QueryNode, ParseError> {
        if let Some(prefix) = wildcard_prefix(word) {
            let mut tokens = self.tokenizer.tokenize(prefix);
            if tokens.len() != 1 {
                return Err(ParseError::syntax(
                    &at.text,
                    at.position,
                    "wildcard prefix must be a single word",
                ));
            }
            return Ok(QueryNode::Wildcard {
                field: None,
                prefix: tokens.remove(0),
            });
        }
        if word.contains('*') {
            return Err(ParseError::syntax(
                &at.text,
                at.position,
                "only a single trailing '*' wildcard is supported",
            ));
        }
        self.text_node(word, at)
    }

    fn text_node(&self, text: &str, at: &Spanned) -> Result<QueryNode, ParseError> {
        let mut tokens = self.tokenizer.tokenize(text);
        match tokens.len() {
            0 => Err(ParseError::syntax(
                &at.text,
                at.position,
                "contains no searchable characters",
            )),
            1 => Ok(QueryNode::Term(tokens.remove(0))),
            _ => Ok(QueryNode::Phrase(tokens)),
        }
    }

    fn expect_right_operand(&self, op: &Spanned) -> Result<(), ParseError> {
        if self.current.token.starts_operand() {
            Ok(())
        } else {
            Err(ParseError::syntax(
                &op.text,
                op.position,
                format!("operator '{}' is missing its right operand", op.text),
            ))
        }
    }

    /// Enter one nesting level at the current token
    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(self.error_here(format!(
                "query nests deeper than {} levels",
                self.limits.max_depth
            )));
        }
        Ok(())
    }

    /// Consume the current token, returning it
    fn advance(&mut self) -> Result<Spanned, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(&self.current.text, self.current.position, message)
    }
}

fn field_eq(field: String, value: FilterValue) -> QueryNode {
    QueryNode::Field(FieldFilter {
        field,
        op: FilterOp::Eq(value),
    })
}

/// `prefix` of a `prefix*` word, if it is one
fn wildcard_prefix(word: &str) -> Option<&str> {
    let prefix = word.strip_suffix('*')?;
    if prefix.is_empty() || prefix.contains('*') {
        None
    } else {
        Some(prefix)
    }
}

fn parse_typed(field_type: FieldType, raw: &str) -> Option<FilterValue> {
    match field_type {
        FieldType::Integer => raw.parse::<i64>().ok().map(FilterValue::Integer),
        FieldType::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(FilterValue::Float),
        FieldType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(FilterValue::Date),
        _ => None,
    }
}

fn invalid_value(field: &str, at: &Spanned, message: impl Into<String>) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        token: at.text.clone(),
        position: at.position,
        message: message.into(),
    }
}

fn invalid_range(field: &str, at: &Spanned, message: impl Into<String>) -> ParseError {
    ParseError::InvalidRange {
        field: field.to_string(),
        token: at.text.clone(),
        position: at.position,
        message: message.into(),
    }
}
