//! Dense, gap-free ordering for the items of a single scope
//! (cards within a column, columns within a board).
//!
//! The collection keeps its items in display order and maintains
//! `item.order() == index` for every item after each operation.

use crate::error::{ReorderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An entity positioned by an integer order index within its scope
pub trait Ordered {
    type Key: Clone + Ord + fmt::Display;

    fn key(&self) -> &Self::Key;
    fn order(&self) -> usize;
    fn set_order(&mut self, order: usize);
}

/// Items of one scope held in order, with `order` values `0..len`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedCollection<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Ordered> OrderedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from items carrying arbitrary (possibly gapped or
    /// duplicated) order values.
    ///
    /// Items are sorted by their current order, ties broken by key, and then
    /// renumbered densely.
    pub fn from_items(mut items: Vec<T>) -> Self {
        items.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.key().cmp(b.key())));
        let mut collection = Self { items };
        collection.renumber_from(0);
        collection
    }

    /// Wraps items already in display order without renumbering them.
    /// Callers must run [`check_dense`](Self::check_dense) before trusting the result.
    pub(crate) fn from_raw(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Index of the item with the given key
    pub fn position(&self, key: &T::Key) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    pub fn find(&self, key: &T::Key) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Keys in display order
    pub fn keys(&self) -> Vec<T::Key> {
        self.items.iter().map(|item| item.key().clone()).collect()
    }

    /// Appends an item with `order = len` and returns that order
    pub fn push(&mut self, mut item: T) -> usize {
        let order = self.items.len();
        item.set_order(order);
        self.items.push(item);
        order
    }

    /// Inserts at `index`, clamped to `len`, and returns the index actually used
    pub fn insert(&mut self, index: usize, item: T) -> usize {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        self.renumber_from(index);
        index
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let index = self.position(key)?;
        self.remove_at(index)
    }

    /// Removes the item at `index` and closes the gap behind it
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.renumber_from(index);
        Some(item)
    }

    /// Mutates one item in place. Any change to its order is undone.
    pub fn edit<R>(&mut self, key: &T::Key, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let index = self.position(key)?;
        let item = &mut self.items[index];
        let result = f(item);
        item.set_order(index);
        Some(result)
    }

    /// Verifies that order values are exactly `0..len` and keys are unique
    pub fn check_dense(&self, scope: &str) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (index, item) in self.items.iter().enumerate() {
            if !seen.insert(item.key()) {
                return Err(ReorderError::InvariantViolation {
                    scope: scope.to_string(),
                    detail: format!("{} appears more than once", item.key()),
                });
            }
            if item.order() != index {
                return Err(ReorderError::InvariantViolation {
                    scope: scope.to_string(),
                    detail: format!(
                        "{} has order {} at position {}",
                        item.key(),
                        item.order(),
                        index
                    ),
                });
            }
        }
        Ok(())
    }

    fn renumber_from(&mut self, start: usize) {
        for (index, item) in self.items.iter_mut().enumerate().skip(start) {
            item.set_order(index);
        }
    }
}

impl<'a, T> IntoIterator for &'a OrderedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
