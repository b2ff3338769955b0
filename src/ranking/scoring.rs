//! Base textual relevance

use crate::backend::LeafMatch;
use crate::query::{FieldFilter, FilterOp, FilterValue, QueryNode};

/// Weight of a phrase leaf relative to a single term
pub const PHRASE_WEIGHT: f32 = 2.0;

/// Share of the base score taken by leaf coverage; the rest is density
pub const COVERAGE_WEIGHT: f32 = 0.85;

/// Relative weight of one scoring leaf
pub fn leaf_weight(leaf: &QueryNode) -> f32 {
    match leaf {
        QueryNode::Phrase(_) => PHRASE_WEIGHT,
        QueryNode::Field(FieldFilter {
            op: FilterOp::Eq(FilterValue::Text(tokens)),
            ..
        }) if tokens.len() > 1 => PHRASE_WEIGHT,
        _ => 1.0,
    }
}

/// Compute base relevance of one document in [0, 1]
///
/// # Arguments
/// * `weights` - Weight of each positive scoring leaf, in query order
/// * `metadata` - How each of those leaves matched the document; missing
///   trailing slots count as unmatched
/// * `token_count` - Tokens the document holds in searchable fields
///
/// # Returns
/// Weighted coverage of the leaves blended with match density, or 1.0
/// when the query has no scoring leaves
pub fn base_relevance(weights: &[f32], metadata: &[Option<LeafMatch>], token_count: u32) -> f32 {
    if weights.is_empty() {
        return 1.0;
    }

    let mut total_weight = 0.0f32;
    let mut covered = 0.0f32;
    let mut occurrences = 0u32;

    for (i, weight) in weights.iter().enumerate() {
        total_weight += weight;
        if let Some(Some(leaf)) = metadata.get(i) {
            covered += weight * leaf.quality.clamp(0.0, 1.0);
            occurrences = occurrences.saturating_add(leaf.occurrences);
        }
    }

    let coverage = if total_weight > 0.0 {
        covered / total_weight
    } else {
        0.0
    };
    let density = if token_count == 0 {
        0.0
    } else {
        (occurrences as f32 / token_count as f32).min(1.0)
    };

    (COVERAGE_WEIGHT * coverage + (1.0 - COVERAGE_WEIGHT) * density).clamp(0.0, 1.0)
}
