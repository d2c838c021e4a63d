// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Open-addressed, linear-probing hash table.
//!
//! Used wherever the language needs a `string -> value` map: globals,
//! class methods, instance fields, and (via [`crate::heap::Heap`]) the
//! string intern pool. Keys are always heap string handles; a slot with
//! no key and a `nil` value is empty, a slot with no key and a `true`
//! value is a tombstone left behind by deletion so linear probing can
//! still pass through it.

use crate::config::{TABLE_INITIAL_CAPACITY, TABLE_MAX_LOAD};
use crate::value::{ObjRef, Value};

#[cfg(test)]
mod table_test;

#[derive(Debug, Clone)]
struct Entry {
    key: Option<ObjRef>,
    hash: u32,
    value: Value,
}

impl Entry {
    const fn empty() -> Self {
        Self {
            key: None,
            hash: 0,
            value: Value::Nil,
        }
    }

    const fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// An open-addressed `String -> Value` map.
#[derive(Debug, Clone, Default)]
pub struct Table {
    count: usize,
    entries: Vec<Entry>,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: 0,
            entries: Vec::new(),
        }
    }

    /// Number of live entries (tombstones are not counted).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Find the slot a key belongs in: the first empty slot or exact key
    /// match found by linear probing from `hash % capacity`, passing over
    /// tombstones (but remembering the first one seen so insertion can
    /// reuse it).
    fn find_entry(entries: &[Entry], capacity: usize, key: ObjRef, hash: u32) -> usize {
        let mut index = hash as usize % capacity;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            match entry.key {
                Some(k) if k == key => return index,
                None if entry.is_tombstone() => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                None => return tombstone.unwrap_or(index),
                Some(_) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let mut new_entries = std::iter::repeat_with(Entry::empty)
            .take(new_capacity)
            .collect::<Vec<_>>();

        let mut new_count = 0;
        for entry in &self.entries {
            let Some(key) = entry.key else { continue };
            let index = Self::find_entry(&new_entries, new_capacity, key, entry.hash);
            new_entries[index] = Entry {
                key: Some(key),
                hash: entry.hash,
                value: entry.value,
            };
            new_count += 1;
        }

        self.entries = new_entries;
        self.count = new_count;
    }

    /// Look up `key` (already hashed by the caller — callers hold the
    /// interned `ObjString` and its cached hash).
    #[must_use]
    pub fn get(&self, key: ObjRef, hash: u32) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let index = Self::find_entry(&self.entries, self.capacity(), key, hash);
        self.entries[index].key.map(|_| self.entries[index].value)
    }

    /// Insert or overwrite `key`. Returns `true` if this created a new
    /// key (it was not previously present, including as a tombstone).
    pub fn set(&mut self, key: ObjRef, hash: u32, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            let new_capacity = if self.capacity() == 0 {
                TABLE_INITIAL_CAPACITY
            } else {
                self.capacity() * 2
            };
            self.grow(new_capacity);
        }

        let index = Self::find_entry(&self.entries, self.capacity(), key, hash);
        let is_new_key = self.entries[index].key.is_none();
        if is_new_key && !self.entries[index].is_tombstone() {
            self.count += 1;
        }
        self.entries[index] = Entry {
            key: Some(key),
            hash,
            value,
        };
        is_new_key
    }

    /// Remove `key`, leaving a tombstone so later probes still pass
    /// through this slot. Returns `true` if the key was present.
    pub fn delete(&mut self, key: ObjRef, hash: u32) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let index = Self::find_entry(&self.entries, self.capacity(), key, hash);
        if self.entries[index].key.is_none() {
            return false;
        }
        self.entries[index] = Entry {
            key: None,
            hash: 0,
            value: Value::Bool(true),
        };
        true
    }

    /// Copy every live entry of `other` into `self`, overwriting on
    /// collision. Used by `INHERIT` to seed a subclass's methods with its
    /// superclass's.
    pub fn add_all(&mut self, other: &Self) {
        for entry in &other.entries {
            if let Some(key) = entry.key {
                self.set(key, entry.hash, entry.value);
            }
        }
    }

    /// Find an already-interned string by its raw bytes and hash, without
    /// needing an `ObjRef` to compare against (there isn't one yet — this
    /// is how the intern pool decides whether to allocate a new string).
    #[must_use]
    pub fn find_string<'a>(
        &self,
        chars: &str,
        hash: u32,
        mut lookup: impl FnMut(ObjRef) -> &'a str,
    ) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let mut index = hash as usize % self.capacity();
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if !entry.is_tombstone() => return None,
                Some(key) if entry.hash == hash && lookup(key) == chars => return Some(key),
                _ => {}
            }
            index = (index + 1) % self.capacity();
        }
    }

    /// Iterate over live `(key, value)` pairs; used by the GC to mark a
    /// table's contents.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, Value)> + '_ {
        self.entries
            .iter()
            .filter_map(|e| e.key.map(|k| (k, e.value)))
    }

    /// Delete every entry whose key fails `keep`. Used by the GC's weak
    /// sweep of the string intern pool.
    pub fn retain_keys(&mut self, mut keep: impl FnMut(ObjRef) -> bool) {
        for entry in &mut self.entries {
            if let Some(key) = entry.key
                && !keep(key)
            {
                *entry = Entry {
                    key: None,
                    hash: 0,
                    value: Value::Bool(true),
                };
                self.count -= 1;
            }
        }
    }
}
