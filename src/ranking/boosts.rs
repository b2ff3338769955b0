//! Domain boosts: exact title, quality and container format

use crate::config::BoostConfig;
use crate::index::DocEntry;
use crate::tokenizer::Tokenizer;

pub const EXACT_TITLE: &str = "exact_title";
pub const QUALITY: &str = "quality";
pub const FORMAT: &str = "format";

/// Multiplier for a "+X%" boost
pub fn factor(percent: f32) -> f32 {
    1.0 + percent / 100.0
}

/// Boost lookup tables prepared from configuration
#[derive(Clone, Debug)]
pub struct BoostRules {
    exact_title: f32,
    quality: Vec<(String, f32)>,
    format: Vec<(String, f32)>,
    articles: Vec<String>,
}

impl BoostRules {
    /// Keys and articles are normalized with `tokenizer` so they compare
    /// equal to indexed values
    pub fn new(config: &BoostConfig, tokenizer: &Tokenizer) -> Self {
        let normalize = |table: &[(String, f32)]| -> Vec<(String, f32)> {
            table
                .iter()
                .map(|(key, percent)| (tokenizer.keyword_key(key), factor(*percent)))
                .collect()
        };
        Self {
            exact_title: factor(config.exact_title_percent),
            quality: normalize(&config.quality),
            format: normalize(&config.format),
            articles: config
                .ignored_title_articles
                .iter()
                .map(|a| tokenizer.normalize(a))
                .collect(),
        }
    }

    /// Boosts that apply to `entry`, in application order, as (name, factor).
    ///
    /// `primary_terms` is the query's normalized primary term sequence.
    pub fn applicable(
        &self,
        entry: &DocEntry,
        primary_terms: &[String],
        tokenizer: &Tokenizer,
    ) -> Vec<(String, f32)> {
        let mut applied = Vec::new();

        if self.is_exact_title(&entry.title_tokens, primary_terms) {
            applied.push((EXACT_TITLE.to_string(), self.exact_title));
        }
        if let Some(f) = lookup(&self.quality, entry, QUALITY, tokenizer) {
            applied.push((QUALITY.to_string(), f));
        }
        if let Some(f) = lookup(&self.format, entry, FORMAT, tokenizer) {
            applied.push((FORMAT.to_string(), f));
        }

        applied
    }

    /// Title equals the query terms once a leading article is dropped from each
    pub fn is_exact_title(&self, title: &[String], query: &[String]) -> bool {
        let title = self.strip_article(title);
        let query = self.strip_article(query);
        !query.is_empty() && title == query
    }

    fn strip_article<'t>(&self, tokens: &'t [String]) -> &'t [String] {
        match tokens.split_first() {
            Some((first, rest)) if !rest.is_empty() && self.articles.contains(first) => rest,
            _ => tokens,
        }
    }
}

fn lookup(
    table: &[(String, f32)],
    entry: &DocEntry,
    field: &str,
    tokenizer: &Tokenizer,
) -> Option<f32> {
    let value = entry.doc.text(field)?;
    let key = tokenizer.keyword_key(value);
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, f)| *f)
        .filter(|f| *f != 1.0)
}

/// Product of the boost factors
pub fn combined(boosts: &[(String, f32)]) -> f32 {
    boosts.iter().map(|(_, f)| f).product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, FieldMapBuilder};
    use std::sync::Arc;

    fn rules() -> (BoostRules, Tokenizer) {
        let tokenizer = Tokenizer::default();
        (BoostRules::new(&BoostConfig::default(), &tokenizer), tokenizer)
    }

    fn entry(title: &str, quality: &str, format: &str, tokenizer: &Tokenizer) -> DocEntry {
        let fields = FieldMapBuilder::new()
            .field("title", title)
            .field("quality", quality)
            .field("format", format)
            .build();
        DocEntry {
            doc: Arc::new(Document::new("m1", fields, 1)),
            token_count: 1,
            title_tokens: tokenizer.tokenize(title),
        }
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_exact_title_ignores_leading_article() {
        let (rules, _) = rules();
        assert!(rules.is_exact_title(&terms(&["the", "batman"]), &terms(&["batman"])));
        assert!(rules.is_exact_title(&terms(&["batman"]), &terms(&["the", "batman"])));
        assert!(!rules.is_exact_title(&terms(&["batman", "begins"]), &terms(&["batman"])));
        assert!(!rules.is_exact_title(&terms(&["batman"]), &[]));
        // A title made of only an article still matches itself
        assert!(rules.is_exact_title(&terms(&["the"]), &terms(&["the"])));
    }

    #[test]
    fn test_applicable_boosts_in_order() {
        let (rules, tokenizer) = rules();
        let e = entry("The Batman", "4K", "MP4", &tokenizer);
        let boosts = rules.applicable(&e, &terms(&["batman"]), &tokenizer);

        let names: Vec<&str> = boosts.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec![EXACT_TITLE, QUALITY, FORMAT]);
        assert!((combined(&boosts) - 1.3 * 1.2 * 1.1).abs() < 1e-5);
    }

    #[test]
    fn test_unlisted_values_get_no_boost() {
        let (rules, tokenizer) = rules();
        let e = entry("Batman Begins", "720p", "avi", &tokenizer);
        assert!(rules.applicable(&e, &terms(&["batman"]), &tokenizer).is_empty());

        let mkv = entry("Joker", "1080p", "mkv", &tokenizer);
        let boosts = rules.applicable(&mkv, &terms(&["joker"]), &tokenizer);
        assert!((combined(&boosts) - 1.3 * 1.1 * 1.05).abs() < 1e-5);
    }

    #[test]
    fn test_composition_is_order_independent() {
        let boosts = vec![
            (QUALITY.to_string(), factor(20.0)),
            (FORMAT.to_string(), factor(5.0)),
            (EXACT_TITLE.to_string(), factor(30.0)),
        ];
        let mut reversed = boosts.clone();
        reversed.reverse();
        assert!((combined(&boosts) - combined(&reversed)).abs() < 1e-6);
    }
}
