//! Generic group-by reductions shared by every report.
//!
//! Selectors return `Option`: a row whose key or value cannot be derived
//! (a deleted join target, an unparseable date) is skipped rather than
//! aborting the whole aggregation. Skips are counted and logged so data
//! loss stays observable.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Result of a group-by reduction: one summary value per key, plus the
/// number of rows that were skipped as malformed.
#[derive(Debug, Clone)]
pub struct Grouped<K, V> {
    pub groups: HashMap<K, V>,
    pub skipped: usize,
}

impl<K, V> Grouped<K, V> {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn log_skips(op: &str, skipped: usize) {
    if skipped > 0 {
        log::warn!("{}: skipped {} malformed rows", op, skipped);
    }
}

/// Rows per key: "products per owner", "rentals per renter".
pub fn count_by_group<T, K, F>(rows: &[T], key_fn: F) -> Grouped<K, u64>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
{
    let mut groups: HashMap<K, u64> = HashMap::new();
    let mut skipped = 0;
    for row in rows {
        match key_fn(row) {
            Some(key) => *groups.entry(key).or_insert(0) += 1,
            None => skipped += 1,
        }
    }
    log_skips("count_by_group", skipped);
    Grouped { groups, skipped }
}

/// Accumulated value per key: "revenue per product", "spend per renter".
pub fn sum_by_group<T, K, F, V>(rows: &[T], key_fn: F, value_fn: V) -> Grouped<K, f64>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
    V: Fn(&T) -> Option<f64>,
{
    let mut groups: HashMap<K, f64> = HashMap::new();
    let mut skipped = 0;
    for row in rows {
        match (key_fn(row), value_fn(row)) {
            (Some(key), Some(value)) => *groups.entry(key).or_insert(0.0) += value,
            _ => skipped += 1,
        }
    }
    log_skips("sum_by_group", skipped);
    Grouped { groups, skipped }
}

/// Mean value per key. A key is only present when at least one well-formed
/// row contributed to it, so an absent key is the "undefined average" case;
/// no division by zero can occur.
pub fn average_by_group<T, K, F, V>(rows: &[T], key_fn: F, value_fn: V) -> Grouped<K, f64>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
    V: Fn(&T) -> Option<f64>,
{
    let mut sums: HashMap<K, (f64, u64)> = HashMap::new();
    let mut skipped = 0;
    for row in rows {
        match (key_fn(row), value_fn(row)) {
            (Some(key), Some(value)) => {
                let entry = sums.entry(key).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
            _ => skipped += 1,
        }
    }
    let groups = sums
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect();
    log_skips("average_by_group", skipped);
    Grouped { groups, skipped }
}

/// First `n` rows under `cmp`, sorted on a copy. The sort is stable, so
/// equal rows keep their input order, and re-applying the same comparator
/// to the output leaves it unchanged.
pub fn top_n<T, F>(rows: &[T], mut cmp: F, n: usize) -> Vec<T>
where
    T: Clone,
    F: FnMut(&T, &T) -> Ordering,
{
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| cmp(a, b));
    sorted.truncate(n);
    sorted
}

/// Descending comparator over a numeric field, for use with [`top_n`].
pub fn by_desc<T, F>(field: F) -> impl FnMut(&T, &T) -> Ordering
where
    F: Fn(&T) -> f64,
{
    move |a, b| {
        field(b)
            .partial_cmp(&field(a))
            .unwrap_or(Ordering::Equal)
    }
}
