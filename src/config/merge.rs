// src/config/merge.rs

//! Recursive merge used by every step of the resolver.
//!
//! Rules, for a key present on both sides:
//! - table + table: merge recursively
//! - array + array: concatenate, dropping duplicates (first-seen order wins)
//! - anything else: the right-hand value replaces the left
//!
//! A key absent on the right keeps the left value. TOML has no null, so
//! "absent" is modelled as `None` at the API boundary.

use toml::{Table, Value};

/// Merge `right` over `left`.
pub fn merge(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Table(l), Value::Table(r)) => Value::Table(merge_tables(l, r)),
        (Value::Array(l), Value::Array(r)) => Value::Array(concat_distinct(l, r)),
        (_, r) => r,
    }
}

/// Merge two optional values; an absent right-hand side keeps the left.
pub fn merge_opt(left: Option<Value>, right: Option<Value>) -> Option<Value> {
    match (left, right) {
        (Some(l), Some(r)) => Some(merge(l, r)),
        (l, None) => l,
        (None, r) => r,
    }
}

/// Merge every key of `right` into `left`.
pub fn merge_tables(mut left: Table, right: Table) -> Table {
    for (key, r) in right {
        let merged = match left.remove(&key) {
            Some(l) => merge(l, r),
            None => r,
        };
        left.insert(key, merged);
    }
    left
}

/// Fold any number of tables left to right; later tables win on conflicts.
pub fn merge_all<I>(tables: I) -> Table
where
    I: IntoIterator<Item = Table>,
{
    tables.into_iter().fold(Table::new(), merge_tables)
}

fn concat_distinct(left: Vec<Value>, right: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(left.len() + right.len());
    for v in left.into_iter().chain(right) {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
