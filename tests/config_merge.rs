// tests/config_merge.rs

use buildwatch::config::{merge, merge_opt, merge_tables};
use proptest::prelude::*;
use toml::{Table, Value};

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(*s)).collect())
}

fn table_from(pairs: &std::collections::BTreeMap<String, i64>) -> Table {
    pairs
        .iter()
        .map(|(k, v)| (k.clone(), Value::Integer(*v)))
        .collect()
}

#[test]
fn arrays_concatenate_without_duplicates() {
    let merged = merge(strings(&["a", "b"]), strings(&["b", "c"]));
    assert_eq!(merged, strings(&["a", "b", "c"]));
}

#[test]
fn scalar_on_the_right_wins() {
    assert_eq!(merge(Value::from(1), Value::from("x")), Value::from("x"));
    assert_eq!(merge(strings(&["a"]), Value::from(false)), Value::from(false));
}

#[test]
fn absent_right_keeps_left() {
    assert_eq!(merge_opt(Some(Value::from(3)), None), Some(Value::from(3)));
    assert_eq!(merge_opt(None, Some(Value::from(4))), Some(Value::from(4)));
    assert_eq!(merge_opt(None, None), None);
}

#[test]
fn nested_tables_merge_recursively() {
    let left: Table = toml::from_str(
        r#"
        reload = true
        [server]
        port = 9000
        host = "localhost"
        [connect]
        tags = ["a"]
        "#,
    )
    .unwrap();
    let right: Table = toml::from_str(
        r#"
        [server]
        port = 9100
        [connect]
        tags = ["a", "b"]
        "#,
    )
    .unwrap();

    let merged = merge_tables(left, right);
    let server = merged["server"].as_table().unwrap();
    assert_eq!(server["port"].as_integer(), Some(9100));
    assert_eq!(server["host"].as_str(), Some("localhost"));
    assert_eq!(merged["connect"]["tags"], strings(&["a", "b"]));
    assert_eq!(merged["reload"].as_bool(), Some(true));
}

#[test]
fn table_replaced_by_scalar() {
    let left: Table = toml::from_str("[server]\nport = 1\n").unwrap();
    let right: Table = toml::from_str("server = \"off\"\n").unwrap();
    let merged = merge_tables(left, right);
    assert_eq!(merged["server"].as_str(), Some("off"));
}

proptest! {
    #[test]
    fn right_scalars_win_and_left_only_keys_survive(
        left in prop::collection::btree_map("[a-f]", any::<i64>(), 0..6),
        right in prop::collection::btree_map("[a-f]", any::<i64>(), 0..6),
    ) {
        let merged = merge_tables(table_from(&left), table_from(&right));

        for (k, v) in &right {
            prop_assert_eq!(merged[k.as_str()].as_integer(), Some(*v));
        }
        for (k, v) in left.iter().filter(|(k, _)| !right.contains_key(*k)) {
            prop_assert_eq!(merged[k.as_str()].as_integer(), Some(*v));
        }
        prop_assert_eq!(merged.len(), left.keys().chain(right.keys()).collect::<std::collections::BTreeSet<_>>().len());
    }

    #[test]
    fn merging_with_empty_is_identity(
        pairs in prop::collection::btree_map("[a-f]", any::<i64>(), 0..6),
    ) {
        let t = table_from(&pairs);
        prop_assert_eq!(merge_tables(t.clone(), Table::new()), t.clone());
        prop_assert_eq!(merge_tables(Table::new(), t.clone()), t);
    }

    #[test]
    fn array_merge_keeps_left_order_and_has_no_duplicates(
        left in prop::collection::vec(0i64..8, 0..8),
        right in prop::collection::vec(0i64..8, 0..8),
    ) {
        let to_value = |v: &Vec<i64>| Value::Array(v.iter().map(|i| Value::Integer(*i)).collect());
        let merged = merge(to_value(&left), to_value(&right));
        let items: Vec<i64> = merged
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_integer().unwrap())
            .collect();

        let mut expected: Vec<i64> = Vec::new();
        for i in left.iter().chain(&right) {
            if !expected.contains(i) {
                expected.push(*i);
            }
        }
        prop_assert_eq!(items, expected);
    }
}
