//! Integration tests for the query language
//!
//! These tests exercise the full pipeline: parsing, capability negotiation
//! and execution through the public engine API.

use std::sync::Arc;

use chrono::NaiveDate;
use mediadex::backend::{required_capabilities, Capability};
use mediadex::models::FieldMapBuilder;
use mediadex::query::{FieldFilter, FilterOp, FilterValue};
use mediadex::{
    parse, CancellationToken, EngineConfig, FieldSchema, InMemorySource, MediadexError,
    ParseError, QueryLimits, QueryNode, SearchEngine,
};

fn schema() -> FieldSchema {
    FieldSchema::media()
}

#[test]
fn test_typed_filters() {
    let ast = parse("release_date:[2020-01-01 TO *] rating:[7 TO 9.5]", &schema()).unwrap();
    let QueryNode::And(left, right) = ast else {
        panic!("expected AND");
    };

    assert_eq!(
        *left,
        QueryNode::Field(FieldFilter {
            field: "release_date".to_string(),
            op: FilterOp::Range {
                low: Some(FilterValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())),
                high: None,
            },
        })
    );
    assert!(matches!(
        *right,
        QueryNode::Field(FieldFilter {
            op: FilterOp::Range {
                low: Some(FilterValue::Float(_)),
                high: Some(FilterValue::Float(_)),
            },
            ..
        })
    ));
}

#[test]
fn test_parse_errors_name_token_and_position() {
    let cases: &[(&str, &str, usize)] = &[
        ("title:AND year:2022", "AND", 6),
        ("batman AND", "AND", 7),
        ("(batman OR joker", "(", 0),
        ("joker)", ")", 5),
    ];
    for (query, token, position) in cases {
        let err = parse(query, &schema()).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }), "{}: {:?}", query, err);
        assert_eq!(err.token(), *token, "{}", query);
        assert_eq!(err.position(), *position, "{}", query);
    }
}

#[test]
fn test_semantic_errors() {
    assert!(matches!(
        parse("colour:red", &schema()),
        Err(ParseError::UnknownField { .. })
    ));
    assert!(matches!(
        parse("year:[2023 TO 2020]", &schema()),
        Err(ParseError::InvalidRange { .. })
    ));
    assert!(matches!(
        parse("title:[a TO b]", &schema()),
        Err(ParseError::InvalidRange { .. })
    ));
    assert!(matches!(
        parse("year:recent", &schema()),
        Err(ParseError::InvalidValue { .. })
    ));
}

#[test]
fn test_round_trip_through_display() {
    let queries = [
        "The Batman",
        "batman AND (year:2022 OR year:2005)",
        "NOT genre:horror quality:4k",
        "title:\"lego batman\" OR cast:\"michael keaton\"",
        "format:mkv* file_name:batman_2022",
        "Amélie OR Léon",
    ];
    let schema = schema();
    for q in queries {
        let first = parse(q, &schema).unwrap();
        let second = parse(&first.to_string(), &schema).unwrap();
        assert_eq!(first, second, "{} -> {}", q, first);
    }
}

#[test]
fn test_required_capabilities_for_full_query() {
    let ast = parse("\"dark knight\" OR bat* AND NOT year:[2000 TO 2010]", &schema()).unwrap();
    let required = required_capabilities(&ast);
    for cap in [
        Capability::Exact,
        Capability::Phrase,
        Capability::Wildcard,
        Capability::Range,
        Capability::Boolean,
    ] {
        assert!(required.contains(cap), "missing {}", cap);
    }
    assert!(!required.contains(Capability::Fuzzy));
}

#[test]
fn test_searchable_fields_beyond_title() {
    let source = InMemorySource::new();
    source.upsert(
        "f1",
        FieldMapBuilder::new()
            .field("title", "Arrival")
            .field("file_name", "arrival-2016-2160p-remux.mkv")
            .field("description", "A linguist decodes an alien language")
            .set("tags", ["sci-fi", "first contact"])
            .field("channel_name", "Cinema Vault")
            .field("channel", "-100123")
            .build(),
    );
    let engine =
        SearchEngine::new(EngineConfig::default(), schema(), Arc::new(source)).unwrap();
    engine.start(&CancellationToken::new()).unwrap();

    for q in ["linguist", "2160p", "\"first contact\"", "vault", "tags:sci-fi"] {
        assert_eq!(engine.search(q, 10).unwrap().total_hits, 1, "{}", q);
    }
    // Not searchable without naming the field
    assert_eq!(engine.search("100123", 10).unwrap().total_hits, 0);
    assert_eq!(engine.search("channel:\"-100123\"", 10).unwrap().total_hits, 1);

    let response = engine.search("linguist OR vault", 10).unwrap();
    assert_eq!(
        response.hits[0].explanation.matched_fields,
        vec!["channel_name", "description"]
    );
}

#[test]
fn test_engine_enforces_query_limits() {
    let source = InMemorySource::new();
    source.upsert("d1", FieldMapBuilder::new().field("title", "Dune").build());
    let config = EngineConfig::default().with_query_limits(QueryLimits {
        max_length: 64,
        max_depth: 3,
    });
    let engine = SearchEngine::new(config, schema(), Arc::new(source)).unwrap();
    engine.start(&CancellationToken::new()).unwrap();

    assert_eq!(engine.search("NOT NOT (dune)", 10).unwrap().total_hits, 1);

    match engine.search("NOT (NOT (NOT dune))", 10) {
        Err(MediadexError::Parse(ParseError::Syntax { token, position, .. })) => {
            assert_eq!(token, "(");
            assert_eq!(position, 9);
        }
        other => panic!("expected a depth error, got {:?}", other.map(|r| r.total_hits)),
    }

    let long = "dune ".repeat(20);
    let err = engine.search(&long, 10).unwrap_err();
    assert!(matches!(
        err,
        MediadexError::Parse(ParseError::Syntax { position: 64, .. })
    ));
}
