//! Backend capabilities and per-query capability requirements

use std::fmt;

use crate::query::{FieldFilter, FilterOp, FilterValue, QueryNode};

/// One query feature a backend may or may not support
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Exact,
    Phrase,
    Wildcard,
    Range,
    Fuzzy,
    Boolean,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Exact,
        Capability::Phrase,
        Capability::Wildcard,
        Capability::Range,
        Capability::Fuzzy,
        Capability::Boolean,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Exact => 1 << 0,
            Capability::Phrase => 1 << 1,
            Capability::Wildcard => 1 << 2,
            Capability::Range => 1 << 3,
            Capability::Fuzzy => 1 << 4,
            Capability::Boolean => 1 << 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::Exact => "EXACT",
            Capability::Phrase => "PHRASE",
            Capability::Wildcard => "WILDCARD",
            Capability::Range => "RANGE",
            Capability::Fuzzy => "FUZZY",
            Capability::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compact set of capabilities
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::of(&Capability::ALL)
    }

    pub fn of(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(Self::empty(), |set, cap| set.with(*cap))
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn union(&self, other: CapabilitySet) -> Self {
        Self(self.0 | other.0)
    }

    /// Capabilities in `self` that `other` lacks
    pub fn difference(&self, other: CapabilitySet) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |cap| self.contains(*cap))
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, cap) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(cap.name())?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilitySet{}", self)
    }
}

/// Minimal capability set needed to evaluate `ast` without degradation.
///
/// Typo tolerance is opportunistic and never required.
pub fn required_capabilities(ast: &QueryNode) -> CapabilitySet {
    match ast {
        QueryNode::Empty => CapabilitySet::empty(),
        QueryNode::Term(_) => CapabilitySet::of(&[Capability::Exact]),
        QueryNode::Phrase(_) => CapabilitySet::of(&[Capability::Exact, Capability::Phrase]),
        QueryNode::Wildcard { .. } => CapabilitySet::of(&[Capability::Wildcard]),
        QueryNode::Field(FieldFilter { op, .. }) => match op {
            FilterOp::Range { .. } => CapabilitySet::of(&[Capability::Range]),
            FilterOp::Eq(FilterValue::Text(tokens)) if tokens.len() > 1 => {
                CapabilitySet::of(&[Capability::Exact, Capability::Phrase])
            }
            FilterOp::Eq(_) => CapabilitySet::of(&[Capability::Exact]),
        },
        QueryNode::Not(inner) => required_capabilities(inner).with(Capability::Boolean),
        QueryNode::And(left, right) | QueryNode::Or(left, right) => required_capabilities(left)
            .union(required_capabilities(right))
            .with(Capability::Boolean),
    }
}
