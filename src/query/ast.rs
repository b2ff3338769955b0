//! Abstract Syntax Tree for query representation
//!
//! The AST is a plain value: constructed once per query, then consumed by
//! backend execution and by the ranker. `Display` renders the canonical
//! query string, which parses back to an equal tree.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

/// Query AST node
#[derive(Clone, Debug, PartialEq)]
pub enum QueryNode {
    /// The empty query. Matches nothing.
    Empty,
    /// Normalized token searched across all searchable fields
    Term(String),
    /// Normalized tokens that must occur adjacently, in order
    Phrase(Vec<String>),
    /// Prefix match, optionally scoped to one field
    Wildcard {
        field: Option<String>,
        prefix: String,
    },
    /// Exact or range filter on a schema field
    Field(FieldFilter),
    Not(Box<QueryNode>),
    And(Box<QueryNode>, Box<QueryNode>),
    Or(Box<QueryNode>, Box<QueryNode>),
}

/// Filter on a single schema field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    /// Lowercase field name
    pub field: String,
    pub op: FilterOp,
}

/// Field filter operator
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOp {
    Eq(FilterValue),
    /// Inclusive range; `None` is an open bound
    Range {
        low: Option<FilterValue>,
        high: Option<FilterValue>,
    },
}

/// Filter operand, already typed by the field's declared type
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    /// Normalized tokens for text fields
    Text(Vec<String>),
    /// Normalized key for keyword and set fields
    Keyword(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
}

impl FilterValue {
    /// Compare two bounds of the same type
    pub fn partial_cmp_value(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Integer(a), FilterValue::Integer(b)) => Some(a.cmp(b)),
            (FilterValue::Float(a), FilterValue::Float(b)) => a.partial_cmp(b),
            (FilterValue::Date(a), FilterValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl QueryNode {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryNode::Empty)
    }

    pub fn and(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::Or(Box::new(left), Box::new(right))
    }

    pub fn not(inner: QueryNode) -> Self {
        QueryNode::Not(Box::new(inner))
    }

    /// Whether this node contributes to textual relevance
    pub fn is_scoring_leaf(&self) -> bool {
        match self {
            QueryNode::Term(_) | QueryNode::Phrase(_) | QueryNode::Wildcard { .. } => true,
            QueryNode::Field(filter) => {
                matches!(filter.op, FilterOp::Eq(FilterValue::Text(_)))
            }
            _ => false,
        }
    }

    /// Scoring leaves outside any NOT branch, left to right.
    ///
    /// Backends number their per-leaf match metadata in this same order.
    pub fn scoring_leaves(&self) -> Vec<&QueryNode> {
        let mut leaves = Vec::new();
        self.collect_scoring_leaves(&mut leaves);
        leaves
    }

    fn collect_scoring_leaves<'a>(&'a self, out: &mut Vec<&'a QueryNode>) {
        match self {
            QueryNode::And(left, right) | QueryNode::Or(left, right) => {
                left.collect_scoring_leaves(out);
                right.collect_scoring_leaves(out);
            }
            QueryNode::Not(_) | QueryNode::Empty => {}
            leaf if leaf.is_scoring_leaf() => out.push(leaf),
            _ => {}
        }
    }

    /// The query's primary term sequence: positive terms, phrases and
    /// values filtered on `title_field`, in query order
    pub fn primary_terms(&self, title_field: &str) -> Vec<String> {
        let mut terms = Vec::new();
        for leaf in self.scoring_leaves() {
            match leaf {
                QueryNode::Term(t) => terms.push(t.clone()),
                QueryNode::Phrase(tokens) => terms.extend(tokens.iter().cloned()),
                QueryNode::Field(FieldFilter {
                    field,
                    op: FilterOp::Eq(FilterValue::Text(tokens)),
                }) if field == title_field => terms.extend(tokens.iter().cloned()),
                _ => {}
            }
        }
        terms
    }

    fn precedence(&self) -> u8 {
        match self {
            QueryNode::Or(..) => 1,
            QueryNode::And(..) => 2,
            QueryNode::Not(_) => 3,
            _ => 4,
        }
    }

    fn fmt_child(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent_precedence: u8,
        right_side: bool,
    ) -> fmt::Result {
        let own = self.precedence();
        // Binary operators parse left-associative, so an equal-precedence
        // child on the right needs explicit grouping.
        let needs_parens = own < parent_precedence || (right_side && own == parent_precedence);
        if needs_parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

const OPERATOR_WORDS: [&str; 4] = ["and", "or", "not", "to"];
const RESERVED_CHARS: [char; 8] = [':', '(', ')', '[', ']', '"', '*', '\\'];

fn needs_quoting(word: &str) -> bool {
    word.is_empty()
        || word.chars().any(|c| c.is_whitespace() || RESERVED_CHARS.contains(&c))
        || OPERATOR_WORDS.contains(&word.to_ascii_lowercase().as_str())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

fn write_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    if needs_quoting(word) {
        write_quoted(f, word)
    } else {
        f.write_str(word)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(tokens) if tokens.len() == 1 => write_word(f, &tokens[0]),
            FilterValue::Text(tokens) => write_quoted(f, &tokens.join(" ")),
            FilterValue::Keyword(key) => write_word(f, key),
            FilterValue::Integer(i) => write!(f, "{}", i),
            FilterValue::Float(x) => write!(f, "{}", x),
            FilterValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl fmt::Display for FieldFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.op {
            FilterOp::Eq(value) => write!(f, "{}:{}", self.field, value),
            FilterOp::Range { low, high } => {
                write!(f, "{}:[", self.field)?;
                match low {
                    Some(v) => write!(f, "{}", v)?,
                    None => f.write_str("*")?,
                }
                f.write_str(" TO ")?;
                match high {
                    Some(v) => write!(f, "{}", v)?,
                    None => f.write_str("*")?,
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Empty => Ok(()),
            QueryNode::Term(term) => write_word(f, term),
            QueryNode::Phrase(tokens) => write_quoted(f, &tokens.join(" ")),
            QueryNode::Wildcard { field, prefix } => {
                if let Some(field) = field {
                    write!(f, "{}:", field)?;
                }
                write!(f, "{}*", prefix)
            }
            QueryNode::Field(filter) => write!(f, "{}", filter),
            QueryNode::Not(inner) => {
                f.write_str("NOT ")?;
                inner.fmt_child(f, 3, false)
            }
            QueryNode::And(left, right) => {
                left.fmt_child(f, 2, false)?;
                f.write_str(" AND ")?;
                right.fmt_child(f, 2, true)
            }
            QueryNode::Or(left, right) => {
                left.fmt_child(f, 1, false)?;
                f.write_str(" OR ")?;
                right.fmt_child(f, 1, true)
            }
        }
    }
}
