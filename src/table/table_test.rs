// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

use super::*;
use proptest::prelude::*;

fn key(n: u32) -> ObjRef {
    ObjRef::from_index(n as usize)
}

#[test]
fn get_on_empty_table_is_none() {
    let table = Table::new();
    assert_eq!(table.get(key(0), 1), None);
}

#[test]
fn set_then_get_roundtrips() {
    let mut table = Table::new();
    assert!(table.set(key(1), 10, Value::Number(42.0)));
    match table.get(key(1), 10) {
        Some(Value::Number(n)) => assert_eq!(n, 42.0),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn set_on_existing_key_overwrites_and_reports_not_new() {
    let mut table = Table::new();
    assert!(table.set(key(1), 10, Value::Number(1.0)));
    assert!(!table.set(key(1), 10, Value::Number(2.0)));
    assert_eq!(table.len(), 1);
}

#[test]
fn delete_then_get_is_none_but_probe_chain_survives() {
    let mut table = Table::new();
    table.set(key(1), 1, Value::Bool(true));
    table.set(key(2), 1, Value::Bool(false)); // collides with key(1)'s hash
    assert!(table.delete(key(1), 1));
    assert_eq!(table.get(key(1), 1), None);
    // key(2) is still reachable despite the tombstone left at its probed slot.
    assert_eq!(table.get(key(2), 1), Some(Value::Bool(false)));
}

#[test]
fn delete_missing_key_returns_false() {
    let mut table = Table::new();
    assert!(!table.delete(key(1), 1));
}

#[test]
fn grows_past_max_load_and_preserves_entries() {
    let mut table = Table::new();
    for i in 0..64 {
        table.set(key(i), i, Value::Number(f64::from(i)));
    }
    assert_eq!(table.len(), 64);
    for i in 0..64 {
        assert_eq!(table.get(key(i), i), Some(Value::Number(f64::from(i))));
    }
}

#[test]
fn add_all_copies_every_live_entry() {
    let mut src = Table::new();
    src.set(key(1), 1, Value::Number(1.0));
    src.set(key(2), 2, Value::Number(2.0));
    let mut dst = Table::new();
    dst.add_all(&src);
    assert_eq!(dst.len(), 2);
    assert_eq!(dst.get(key(2), 2), Some(Value::Number(2.0)));
}

#[test]
fn find_string_matches_by_content_and_hash() {
    let mut table = Table::new();
    let strings = vec!["hello".to_owned(), "world".to_owned()];
    let hash_hello = crate::object::fnv1a_hash(b"hello");
    table.set(key(0), hash_hello, Value::Bool(true));
    let found = table.find_string("hello", hash_hello, |r| strings[r.index()].as_str());
    assert_eq!(found, Some(key(0)));
    let not_found = table.find_string("missing", 999, |r| strings[r.index()].as_str());
    assert_eq!(not_found, None);
}

#[test]
fn retain_keys_removes_entries_failing_predicate() {
    let mut table = Table::new();
    table.set(key(1), 1, Value::Bool(true));
    table.set(key(2), 2, Value::Bool(true));
    table.retain_keys(|k| k == key(1));
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(key(1), 1), Some(Value::Bool(true)));
    assert_eq!(table.get(key(2), 2), None);
}

proptest! {
    /// A resize triggered anywhere in an arbitrary insert/delete sequence
    /// must never lose a key that is still live at the end of it.
    #[test]
    fn resize_preserves_every_live_entry(ops in prop::collection::vec((0u32..40, any::<bool>()), 0..200)) {
        let mut table = Table::new();
        let mut model = std::collections::HashMap::new();
        for (k, is_insert) in ops {
            let r = key(k);
            if is_insert {
                table.set(r, k, Value::Number(f64::from(k)));
                model.insert(k, Value::Number(f64::from(k)));
            } else {
                table.delete(r, k);
                model.remove(&k);
            }
        }
        for (k, expected) in &model {
            prop_assert_eq!(table.get(key(*k), *k), Some(*expected));
        }
        prop_assert_eq!(table.len(), model.len());
    }
}
