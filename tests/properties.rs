//! Algebraic properties of parsing, indexing and ranking

use std::sync::Arc;

use mediadex::backend::{InvertedBackend, SearchBackend};
use mediadex::index::{IndexSnapshot, StagingIndex};
use mediadex::models::{Document, FieldMapBuilder};
use mediadex::ranking::{boosts, Ranker};
use mediadex::{parse, BoostConfig, FieldSchema, FuzzyConfig, Tokenizer};
use proptest::prelude::*;

const TITLE_WORDS: &[&str] = &[
    "the", "batman", "begins", "lego", "joker", "dark", "knight", "dune", "arrival", "movie",
];
/// Accented, fullwidth and mathematical forms that fold to plain words
const FOLDED_WORDS: &[&str] = &[
    "Amélie", "Léon", "ZOË", "𝐓𝐡𝐞", "𝐁𝐚𝐭𝐦𝐚𝐧", "ＤＵＮＥ", "Ｊｏｋｅｒ",
];
const QUALITIES: &[&str] = &["720p", "1080p", "4K", "UHD"];
const FORMATS: &[&str] = &["mp4", "mkv", "avi"];

fn leaf_query() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(TITLE_WORDS).prop_map(str::to_string),
        prop::sample::select(TITLE_WORDS).prop_map(|w| format!("{}*", &w[..w.len().min(3)])),
        (prop::sample::select(TITLE_WORDS), prop::sample::select(TITLE_WORDS))
            .prop_map(|(a, b)| format!("\"{} {}\"", a, b)),
        (1990i64..2030).prop_map(|y| format!("year:{}", y)),
        (1990i64..2010, 0i64..20)
            .prop_map(|(lo, span)| format!("year:[{} TO {}]", lo, lo + span)),
        prop::sample::select(QUALITIES).prop_map(|q| format!("quality:{}", q)),
        prop::sample::select(TITLE_WORDS).prop_map(|w| format!("title:{}", w)),
        prop::sample::select(FOLDED_WORDS).prop_map(str::to_string),
        prop::sample::select(FOLDED_WORDS).prop_map(|w| format!("{}*", w)),
        prop::sample::select(FOLDED_WORDS).prop_map(|w| format!("title:{}", w)),
        (prop::sample::select(FOLDED_WORDS), prop::sample::select(TITLE_WORDS))
            .prop_map(|(a, b)| format!("\"{} {}\"", a, b)),
        Just("rating:[7.5 TO *]".to_string()),
    ]
}

fn query() -> impl Strategy<Value = String> {
    leaf_query().prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} AND {}", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} OR {}", a, b)),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{} {}", a, b)),
            inner.clone().prop_map(|a| format!("NOT {}", a)),
            inner.prop_map(|a| format!("({})", a)),
        ]
    })
}

#[derive(Clone, Debug)]
struct Movie {
    title: Vec<&'static str>,
    year: i64,
    quality: &'static str,
    format: &'static str,
}

fn movie() -> impl Strategy<Value = Movie> {
    (
        prop::collection::vec(prop::sample::select(TITLE_WORDS), 1..4),
        1990i64..2030,
        prop::sample::select(QUALITIES),
        prop::sample::select(FORMATS),
    )
        .prop_map(|(title, year, quality, format)| Movie {
            title,
            year,
            quality,
            format,
        })
}

fn document(id: usize, movie: &Movie) -> Document {
    let fields = FieldMapBuilder::new()
        .field("title", movie.title.join(" "))
        .field("year", movie.year)
        .field("quality", movie.quality)
        .field("format", movie.format)
        .build();
    Document::new(format!("m{}", id), fields, id as i64)
}

fn staging(movies: &[Movie]) -> StagingIndex {
    let mut staging = StagingIndex::new(Arc::new(FieldSchema::media()), Tokenizer::default());
    for (i, m) in movies.iter().enumerate() {
        staging.insert(document(i, m));
    }
    staging
}

fn ranked(snapshot: &IndexSnapshot, q: &str, limit: usize) -> Vec<(String, f32)> {
    let ast = parse(q, snapshot.schema()).unwrap();
    let candidates = InvertedBackend::new(FuzzyConfig::default())
        .execute(&ast, snapshot)
        .unwrap();
    Ranker::new(&BoostConfig::default(), Tokenizer::default())
        .rank(snapshot, &ast, &candidates, limit)
        .hits
        .into_iter()
        .map(|h| (h.doc_id.0, h.score))
        .collect()
}

proptest! {
    #[test]
    fn prop_display_round_trips(q in query()) {
        let schema = FieldSchema::media();
        let first = parse(&q, &schema).unwrap();
        let second = parse(&first.to_string(), &schema).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_insert_then_remove_is_invisible(
        movies in prop::collection::vec(movie(), 1..12),
        extra in movie(),
        q in query(),
    ) {
        let mut staging = staging(&movies);
        let before = staging.snapshot(1, 0);

        let doc = document(999, &extra);
        let id = doc.id.clone();
        staging.insert(doc);
        prop_assert!(staging.remove(&id));
        let after = staging.snapshot(2, 0);

        prop_assert_eq!(ranked(&before, &q, 100), ranked(&after, &q, 100));
    }

    #[test]
    fn prop_truncation_is_a_prefix(
        movies in prop::collection::vec(movie(), 1..20),
        q in query(),
        limit in 0usize..10,
    ) {
        let snapshot = staging(&movies).snapshot(1, 0);
        let full = ranked(&snapshot, &q, usize::MAX);
        let top = ranked(&snapshot, &q, limit);
        prop_assert_eq!(&top[..], &full[..limit.min(full.len())]);
    }

    #[test]
    fn prop_boost_composition_is_order_independent(
        percents in prop::collection::vec(0.0f32..50.0, 0..4),
        rotation in 0usize..4,
    ) {
        let applied: Vec<(String, f32)> = percents
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("b{}", i), boosts::factor(*p)))
            .collect();
        let mut rotated = applied.clone();
        if !rotated.is_empty() {
            let by = rotation % rotated.len();
            rotated.rotate_left(by);
        }
        let a = boosts::combined(&applied);
        let b = boosts::combined(&rotated);
        prop_assert!((a - b).abs() <= a.abs() * 1e-5);
    }
}
