use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Directed reference from one record to a linked title, both interner ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
}

impl Edge {
    pub fn new(from: u32, to: u32) -> Self {
        Self { from, to }
    }
}

/// Append-only list that doubles its capacity on overflow.
///
/// Elements are addressed by index only, so relocation on growth is never
/// observable.
#[derive(Debug, Clone)]
pub struct GrowableList<T> {
    items: Vec<T>,
}

impl<T> GrowableList<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) {
        if self.items.len() == self.items.capacity() {
            let target = (self.items.len() * 2).max(1);
            self.items.reserve_exact(target - self.items.len());
        }
        self.items.push(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Default for GrowableList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Index<usize> for GrowableList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a GrowableList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
