use std::sync::Arc;

use mediadex::models::{FieldMap, FieldMapBuilder};
use mediadex::{
    CancellationToken, EngineConfig, EngineState, FieldSchema, InMemorySource, MediadexError,
    ParseError, SearchEngine,
};

fn movie(title: &str, year: i64, quality: &str, genres: &[&str], format: &str) -> FieldMap {
    FieldMapBuilder::new()
        .field("title", title)
        .field("year", year)
        .field("quality", quality)
        .set("genre", genres.iter().copied())
        .field("format", format)
        .build()
}

fn catalogue() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.upsert(
        "m1",
        movie("The Batman", 2022, "1080p", &["Action", "Crime"], "mkv"),
    );
    source.upsert("m2", movie("Batman Begins", 2005, "720p", &["Action"], "mp4"));
    source.upsert(
        "m3",
        movie(
            "The Lego Batman Movie",
            2017,
            "4K",
            &["Animation", "Comedy"],
            "mp4",
        ),
    );
    source.upsert("m4", movie("Joker", 2019, "1080p", &["Crime", "Drama"], "mkv"));
    Arc::new(source)
}

fn setup_engine() -> SearchEngine {
    let engine =
        SearchEngine::new(EngineConfig::default(), FieldSchema::media(), catalogue()).unwrap();
    engine.start(&CancellationToken::new()).unwrap();
    engine
}

fn search_ids(engine: &SearchEngine, query: &str) -> Vec<String> {
    engine
        .search(query, 50)
        .unwrap()
        .hits
        .into_iter()
        .map(|h| h.doc_id.0)
        .collect()
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort_unstable();
    ids
}

#[test]
fn golden_term_and_year_filter() {
    let engine = setup_engine();
    assert_eq!(search_ids(&engine, "batman AND year:2022"), vec!["m1"]);
}

#[test]
fn golden_title_filter_ranks_exact_title_first() {
    let engine = setup_engine();
    let response = engine.search("title:batman", 50).unwrap();

    assert_eq!(response.total_hits, 3);
    assert_eq!(response.hits[0].doc_id.as_str(), "m1");
    assert_eq!(sorted(search_ids(&engine, "title:batman")), vec!["m1", "m2", "m3"]);

    let boosts: Vec<&str> = response.hits[0]
        .explanation
        .boosts
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(boosts, vec!["exact_title", "quality", "format"]);
}

#[test]
fn golden_genre_and_quality_filters() {
    let engine = setup_engine();
    assert_eq!(search_ids(&engine, "genre:action AND quality:1080p"), vec!["m1"]);
    assert_eq!(
        sorted(search_ids(&engine, "genre:crime")),
        vec!["m1", "m4"]
    );
}

#[test]
fn golden_operator_as_field_value_is_a_parse_error() {
    let engine = setup_engine();
    match engine.search("title:AND year:2022", 50) {
        Err(MediadexError::Parse(ParseError::Syntax {
            token, position, ..
        })) => {
            assert_eq!(token, "AND");
            assert_eq!(position, 6);
        }
        other => panic!("expected a syntax error, got {:?}", other.map(|r| r.ids().len())),
    }
}

#[test]
fn golden_range_phrase_and_negation() {
    let engine = setup_engine();
    assert_eq!(
        sorted(search_ids(&engine, "year:[2010 TO *]")),
        vec!["m1", "m3", "m4"]
    );
    assert_eq!(search_ids(&engine, "\"lego batman\""), vec!["m3"]);
    assert_eq!(
        sorted(search_ids(&engine, "batman NOT lego")),
        vec!["m1", "m2"]
    );
}

#[test]
fn golden_typo_tolerance() {
    let engine = setup_engine();
    assert_eq!(
        sorted(search_ids(&engine, "batmn")),
        vec!["m1", "m2", "m3"]
    );
    assert_eq!(search_ids(&engine, "jokr"), vec!["m4"]);
}

#[test]
fn golden_styled_letters_match_plain_titles() {
    let engine = setup_engine();
    let response = engine.search("𝐓𝐡𝐞 𝐁𝐚𝐭𝐦𝐚𝐧", 50).unwrap();

    assert_eq!(response.hits[0].doc_id.as_str(), "m1");
    assert!(response.hits[0]
        .explanation
        .boosts
        .iter()
        .any(|(name, _)| name == "exact_title"));
    assert_eq!(search_ids(&engine, "title:ＪＯＫＥＲ"), vec!["m4"]);
}

#[test]
fn golden_empty_query_has_no_results() {
    let engine = setup_engine();
    let response = engine.search("", 50).unwrap();
    assert!(response.hits.is_empty());
    assert_eq!(response.total_hits, 0);
}

#[test]
fn golden_fallback_to_substring_backend() {
    let engine = setup_engine();
    assert!(engine.set_backend_available("inverted", false));

    let response = engine.search("batman", 50).unwrap();
    assert_eq!(response.backend, "substring");
    assert_eq!(response.total_hits, 3);
    assert!(!response.best_effort);

    // Ranges are not supported there and are loosened
    let response = engine.search("batman AND year:[2020 TO *]", 50).unwrap();
    assert!(response.best_effort);
    assert_eq!(response.total_hits, 3);
}

#[test]
fn golden_whole_chain_outage_and_recovery() {
    let engine = setup_engine();
    let generation = engine.generation();

    engine.set_backend_available("inverted", false);
    engine.set_backend_available("substring", false);

    match engine.search("batman", 50) {
        Err(MediadexError::SearchUnavailable { attempted }) => {
            assert_eq!(attempted, vec!["inverted", "substring"]);
        }
        other => panic!("expected SearchUnavailable, got {:?}", other.map(|r| r.total_hits)),
    }

    let health = engine.health();
    assert_eq!(health.state, EngineState::Degraded);
    assert_eq!(health.active_backend, None);
    assert_eq!(health.snapshot_generation, generation);
    assert_eq!(health.document_count, 4);

    engine.set_backend_available("inverted", true);
    let response = engine.search("batman", 50).unwrap();
    assert_eq!(response.total_hits, 3);
    assert_eq!(engine.state(), EngineState::Active);
}
