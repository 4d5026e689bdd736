// Copyright 2025 the Reparam Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sparse name-keyed value storage.
//!
//! Used for instance values and for descriptor slots. Entries live in a
//! sorted `SmallVec` searched with binary search: hosts usually have a
//! handful of parameters and descriptors a dozen slots, so contiguous
//! storage beats a hash map and the first entries never touch the heap.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::value::Value;

/// Inline capacity before the store spills to the heap.
const INLINE_CAPACITY: usize = 8;

/// Sorted `name → value` map.
#[derive(Clone, Debug, Default)]
pub(crate) struct ValueStore {
    entries: SmallVec<[(Rc<str>, Value); INLINE_CAPACITY]>,
}

impl ValueStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn find(&self, name: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(key, _)| key.as_ref().cmp(name))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.find(name).is_ok()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.find(name).ok().map(|i| &self.entries[i].1)
    }

    /// Stores `value`, returning the previous one.
    pub(crate) fn insert(&mut self, name: &str, value: Value) -> Option<Value> {
        match self.find(name) {
            Ok(i) => Some(core::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (Rc::from(name), value));
                None
            }
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Value> {
        self.find(name).ok().map(|i| self.entries.remove(i).1)
    }

    /// Entries in name order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut store = ValueStore::new();
        assert!(store.get("x").is_none());

        assert_eq!(store.insert("x", Value::Int(1)), None);
        assert_eq!(store.insert("x", Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(store.get("x"), Some(&Value::Int(2)));
        assert!(store.contains("x"));

        assert_eq!(store.remove("x"), Some(Value::Int(2)));
        assert!(!store.contains("x"));
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn entries_stay_sorted() {
        let mut store = ValueStore::new();
        for name in ["c", "a", "b", "e", "d"] {
            store.insert(name, Value::from(name));
        }
        let names: Vec<_> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn spills_past_inline_capacity() {
        let mut store = ValueStore::new();
        for i in 0..20_i64 {
            store.insert(&format!("p{i:02}"), Value::Int(i));
        }
        assert_eq!(store.iter().count(), 20);
        assert_eq!(store.get("p13"), Some(&Value::Int(13)));
    }
}
