//! Typo tolerance: bounded Levenshtein expansion over the term dictionary

use crate::config::FuzzyConfig;
use crate::index::{TermDictionary, TermPosting};

/// Levenshtein distance over chars: single-character insertions,
/// deletions and substitutions
fn distance_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Shorter string along the row
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut prev_row: Vec<usize> = (0..=shorter.len()).collect();
    let mut curr_row = vec![0; shorter.len() + 1];

    for i in 1..=longer.len() {
        curr_row[0] = i;
        for j in 1..=shorter.len() {
            let cost = usize::from(longer[i - 1] != shorter[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[shorter.len()]
}

/// Distance between `a` and `b` if it is at most `max`
fn bounded_distance(a: &[char], b: &[char], max: u32) -> Option<u32> {
    if a.len().abs_diff(b.len()) > max as usize {
        return None;
    }
    let distance = distance_chars(a, b) as u32;
    (distance <= max).then_some(distance)
}

/// A dictionary term reached by typo expansion
#[derive(Debug, Clone, Copy)]
pub struct Expansion<'a> {
    pub term: &'a str,
    pub posting: &'a TermPosting,
    pub distance: u32,
}

/// Dictionary terms within the allowed edit distance of `term`, closest
/// first, at most `max_expansions` of them.
///
/// With `prefix_only`, each dictionary term is compared on its first
/// `term.len()` characters, so a misspelled wildcard prefix still expands.
pub fn expand<'a>(
    dictionary: &'a TermDictionary,
    term: &str,
    config: &FuzzyConfig,
    prefix_only: bool,
) -> Vec<Expansion<'a>> {
    let query: Vec<char> = term.chars().collect();
    let max = config.allowed_distance(query.len());
    if max == 0 {
        return Vec::new();
    }

    let mut expansions: Vec<Expansion<'a>> = dictionary
        .iter()
        .filter_map(|(candidate, posting)| {
            let chars: Vec<char> = if prefix_only {
                candidate.chars().take(query.len()).collect()
            } else {
                candidate.chars().collect()
            };
            let distance = bounded_distance(&query, &chars, max)?;
            (distance > 0).then_some(Expansion {
                term: candidate,
                posting,
                distance,
            })
        })
        .collect();

    expansions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.term.cmp(b.term)));
    expansions.truncate(config.max_expansions);
    expansions
}
