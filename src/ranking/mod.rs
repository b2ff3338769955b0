//! Ranking engine: base relevance times domain boosts, then a total order
//!
//! Final score = base relevance in [0, 1] × exact-title × quality × format.
//! Ties are broken by newer indexing timestamp, then by id ascending, so
//! the order is total and a truncated list is always a prefix of the full
//! ranking.

pub mod boosts;
pub mod scoring;

pub use boosts::BoostRules;
pub use scoring::{base_relevance, leaf_weight};

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::backend::{CandidateSet, LeafMatch};
use crate::config::BoostConfig;
use crate::index::{DocEntry, IndexSnapshot, TITLE_FIELD};
use crate::models::{MatchExplanation, SearchHit};
use crate::query::QueryNode;
use crate::tokenizer::Tokenizer;

/// Ranked hits plus the number of matches before truncation
#[derive(Clone, Debug)]
pub struct RankedHits {
    pub hits: Vec<SearchHit>,
    pub total_hits: u64,
}

/// What ranking needs from the query, computed once per query
struct QueryProfile {
    weights: Vec<f32>,
    primary_terms: Vec<String>,
}

impl QueryProfile {
    fn new(ast: &QueryNode) -> Self {
        Self {
            weights: ast.scoring_leaves().into_iter().map(leaf_weight).collect(),
            primary_terms: ast.primary_terms(TITLE_FIELD),
        }
    }
}

/// Scores and orders candidates
#[derive(Clone, Debug)]
pub struct Ranker {
    rules: BoostRules,
    tokenizer: Tokenizer,
}

impl Ranker {
    pub fn new(config: &BoostConfig, tokenizer: Tokenizer) -> Self {
        Self {
            rules: BoostRules::new(config, &tokenizer),
            tokenizer,
        }
    }

    /// Final score of one document for `ast`
    pub fn score(
        &self,
        entry: &DocEntry,
        ast: &QueryNode,
        metadata: &[Option<LeafMatch>],
    ) -> f32 {
        self.explain(entry, ast, metadata).0
    }

    /// Final score together with the matched fields and boosts behind it
    pub fn explain(
        &self,
        entry: &DocEntry,
        ast: &QueryNode,
        metadata: &[Option<LeafMatch>],
    ) -> (f32, MatchExplanation) {
        self.explain_with(&QueryProfile::new(ast), entry, metadata)
    }

    fn explain_with(
        &self,
        profile: &QueryProfile,
        entry: &DocEntry,
        metadata: &[Option<LeafMatch>],
    ) -> (f32, MatchExplanation) {
        let base = base_relevance(&profile.weights, metadata, entry.token_count);
        let boosts = self
            .rules
            .applicable(entry, &profile.primary_terms, &self.tokenizer);
        let score = base * boosts::combined(&boosts);

        let matched_fields: BTreeSet<&String> = metadata
            .iter()
            .flatten()
            .flat_map(|leaf| leaf.fields.iter())
            .collect();

        let explanation = MatchExplanation {
            matched_fields: matched_fields.into_iter().cloned().collect(),
            base_score: base,
            boosts,
        };
        (score, explanation)
    }

    /// Score every candidate, order them and keep the first `limit`
    pub fn rank(
        &self,
        snapshot: &IndexSnapshot,
        ast: &QueryNode,
        candidates: &CandidateSet,
        limit: usize,
    ) -> RankedHits {
        let profile = QueryProfile::new(ast);
        let store = snapshot.store();

        let mut scored: Vec<(SearchHit, i64)> = candidates
            .docs
            .iter()
            .filter_map(|docno| {
                let entry = store.entry(docno)?;
                let (score, explanation) =
                    self.explain_with(&profile, entry, candidates.metadata(docno));
                let hit =
                    SearchHit::new(entry.doc.id.clone(), score).with_explanation(explanation);
                Some((hit, entry.doc.indexed_at))
            })
            .collect();

        let total_hits = scored.len() as u64;
        scored.sort_by(|(a, a_time), (b, b_time)| compare_hits(a, *a_time, b, *b_time));
        scored.truncate(limit);

        RankedHits {
            hits: scored.into_iter().map(|(hit, _)| hit).collect(),
            total_hits,
        }
    }
}

/// Score descending, then newer first, then id ascending
fn compare_hits(a: &SearchHit, a_time: i64, b: &SearchHit, b_time: i64) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b_time.cmp(&a_time))
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InvertedBackend, SearchBackend};
    use crate::config::FuzzyConfig;
    use crate::index::StagingIndex;
    use crate::models::{Document, FieldMapBuilder};
    use crate::query::parse;
    use crate::schema::FieldSchema;
    use std::sync::Arc;

    fn snapshot(docs: Vec<Document>) -> IndexSnapshot {
        let mut staging = StagingIndex::new(Arc::new(FieldSchema::media()), Tokenizer::default());
        for doc in docs {
            staging.insert(doc);
        }
        staging.snapshot(1, 0)
    }

    fn movie(id: &str, title: &str, quality: &str, indexed_at: i64) -> Document {
        Document::new(
            id,
            FieldMapBuilder::new()
                .field("title", title)
                .field("quality", quality)
                .build(),
            indexed_at,
        )
    }

    fn ranked(snapshot: &IndexSnapshot, query: &str, limit: usize) -> RankedHits {
        let ast = parse(query, snapshot.schema()).unwrap();
        let candidates = InvertedBackend::new(FuzzyConfig::default())
            .execute(&ast, snapshot)
            .unwrap();
        Ranker::new(&BoostConfig::default(), Tokenizer::default()).rank(
            snapshot,
            &ast,
            &candidates,
            limit,
        )
    }

    fn ids(hits: &RankedHits) -> Vec<&str> {
        hits.hits.iter().map(|h| h.doc_id.as_str()).collect()
    }

    #[test]
    fn test_exact_title_and_quality_order() {
        let snap = snapshot(vec![
            movie("m1", "The Batman", "1080p", 10),
            movie("m2", "Batman Begins", "720p", 20),
            movie("m3", "Batman Returns", "4K", 30),
        ]);
        let result = ranked(&snap, "batman", 10);
        assert_eq!(result.total_hits, 3);
        assert_eq!(ids(&result)[0], "m1");

        let top = &result.hits[0].explanation;
        assert_eq!(top.matched_fields, vec!["title"]);
        assert_eq!(top.boosts[0].0, boosts::EXACT_TITLE);

        // 4K outranks 720p among the partial title matches
        assert_eq!(&ids(&result)[1..], &["m3", "m2"]);
    }

    #[test]
    fn test_ties_break_on_timestamp_then_id() {
        let snap = snapshot(vec![
            movie("b", "Joker", "720p", 5),
            movie("a", "Joker", "720p", 5),
            movie("c", "Joker", "720p", 9),
        ]);
        let result = ranked(&snap, "joker", 10);
        assert_eq!(ids(&result), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_truncation_is_a_prefix() {
        let snap = snapshot(
            (0..12)
                .map(|i| {
                    let quality = if i % 3 == 0 { "4K" } else { "720p" };
                    movie(&format!("m{:02}", i), "Batman", quality, i)
                })
                .collect(),
        );
        let full = ranked(&snap, "batman", 100);
        let top = ranked(&snap, "batman", 5);
        assert_eq!(top.total_hits, 12);
        assert_eq!(ids(&top), ids(&full)[..5].to_vec());
    }

    #[test]
    fn test_pure_filter_uses_boosts_only() {
        let snap = snapshot(vec![
            movie("m1", "Joker", "720p", 1),
            movie("m2", "Dune", "4K", 1),
        ]);
        let result = ranked(&snap, "NOT quality:1080p", 10);
        assert_eq!(ids(&result), vec!["m2", "m1"]);
        assert_eq!(result.hits[1].score, 1.0);
        assert!((result.hits[0].score - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_score_matches_rank() {
        let snap = snapshot(vec![movie("m1", "The Batman", "4K", 1)]);
        let ast = parse("batman", snap.schema()).unwrap();
        let candidates = InvertedBackend::new(FuzzyConfig::default())
            .execute(&ast, &snap)
            .unwrap();
        let ranker = Ranker::new(&BoostConfig::default(), Tokenizer::default());
        let docno = snap.store().docno(&"m1".into()).unwrap();
        let entry = snap.store().entry(docno).unwrap();

        let score = ranker.score(entry, &ast, candidates.metadata(docno));
        let result = ranker.rank(&snap, &ast, &candidates, 1);
        assert_eq!(result.hits[0].score, score);
    }
}
