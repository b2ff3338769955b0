//! Per-field value tables for exact and range filtering
//!
//! - keyword/set: normalized key to doc bitmap, ordered so field-scoped
//!   prefix filters are a range scan
//! - integer/date: ordered `i64` keys (dates as days since the common era)
//! - float: ordered `OrderedFloat<f64>` keys

use chrono::{Datelike, NaiveDate};
use ordered_float::OrderedFloat;
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// Ordered key for a calendar date
pub fn date_key(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

#[derive(Clone, Debug, Default)]
pub struct FieldTables {
    keywords: HashMap<String, BTreeMap<String, RoaringBitmap>>,
    integers: HashMap<String, BTreeMap<i64, RoaringBitmap>>,
    floats: HashMap<String, BTreeMap<OrderedFloat<f64>, RoaringBitmap>>,
}

impl FieldTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_keyword(&mut self, field: &str, key: &str, docno: u32) {
        let table = self.keywords.entry(field.to_string()).or_default();
        match table.get_mut(key) {
            Some(docs) => {
                docs.insert(docno);
            }
            None => {
                table.insert(key.to_string(), single(docno));
            }
        }
    }

    pub fn remove_keyword(&mut self, field: &str, key: &str, docno: u32) {
        if let Some(table) = self.keywords.get_mut(field) {
            remove_from(table, key, docno);
            if table.is_empty() {
                self.keywords.remove(field);
            }
        }
    }

    pub fn add_integer(&mut self, field: &str, value: i64, docno: u32) {
        insert_into(self.integers.entry(field.to_string()).or_default(), value, docno);
    }

    pub fn remove_integer(&mut self, field: &str, value: i64, docno: u32) {
        if let Some(table) = self.integers.get_mut(field) {
            remove_from(table, &value, docno);
            if table.is_empty() {
                self.integers.remove(field);
            }
        }
    }

    pub fn add_float(&mut self, field: &str, value: f64, docno: u32) {
        insert_into(
            self.floats.entry(field.to_string()).or_default(),
            OrderedFloat(value),
            docno,
        );
    }

    pub fn remove_float(&mut self, field: &str, value: f64, docno: u32) {
        if let Some(table) = self.floats.get_mut(field) {
            remove_from(table, &OrderedFloat(value), docno);
            if table.is_empty() {
                self.floats.remove(field);
            }
        }
    }

    /// Documents whose keyword/set field holds exactly `key`
    pub fn keyword_docs(&self, field: &str, key: &str) -> RoaringBitmap {
        self.keywords
            .get(field)
            .and_then(|table| table.get(key))
            .cloned()
            .unwrap_or_default()
    }

    /// Documents whose keyword/set field holds a key starting with `prefix`
    pub fn keyword_prefix_docs(&self, field: &str, prefix: &str) -> RoaringBitmap {
        let Some(table) = self.keywords.get(field) else {
            return RoaringBitmap::new();
        };
        table
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .fold(RoaringBitmap::new(), |acc, (_, docs)| acc | docs)
    }

    pub fn integer_range(&self, field: &str, low: Bound<i64>, high: Bound<i64>) -> RoaringBitmap {
        match self.integers.get(field) {
            Some(table) => union_range(table, low, high),
            None => RoaringBitmap::new(),
        }
    }

    pub fn float_range(&self, field: &str, low: Bound<f64>, high: Bound<f64>) -> RoaringBitmap {
        match self.floats.get(field) {
            Some(table) => union_range(table, ordered_bound(low), ordered_bound(high)),
            None => RoaringBitmap::new(),
        }
    }
}

fn ordered_bound(bound: Bound<f64>) -> Bound<OrderedFloat<f64>> {
    match bound {
        Bound::Included(v) => Bound::Included(OrderedFloat(v)),
        Bound::Excluded(v) => Bound::Excluded(OrderedFloat(v)),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn single(docno: u32) -> RoaringBitmap {
    let mut docs = RoaringBitmap::new();
    docs.insert(docno);
    docs
}

fn insert_into<K: Ord>(table: &mut BTreeMap<K, RoaringBitmap>, key: K, docno: u32) {
    table.entry(key).or_default().insert(docno);
}

fn remove_from<K, Q>(table: &mut BTreeMap<K, RoaringBitmap>, key: &Q, docno: u32)
where
    K: Ord + std::borrow::Borrow<Q>,
    Q: Ord + ?Sized,
{
    let now_empty = match table.get_mut(key) {
        Some(docs) => {
            docs.remove(docno);
            docs.is_empty()
        }
        None => false,
    };
    if now_empty {
        table.remove(key);
    }
}

fn union_range<K: Ord>(table: &BTreeMap<K, RoaringBitmap>, low: Bound<K>, high: Bound<K>) -> RoaringBitmap {
    // BTreeMap::range panics on inverted bounds
    if let (Bound::Included(l) | Bound::Excluded(l), Bound::Included(h) | Bound::Excluded(h)) =
        (&low, &high)
    {
        if l > h {
            return RoaringBitmap::new();
        }
        if l == h && !(matches!(low, Bound::Included(_)) && matches!(high, Bound::Included(_))) {
            return RoaringBitmap::new();
        }
    }
    table
        .range((low, high))
        .fold(RoaringBitmap::new(), |acc, (_, docs)| acc | docs)
}
