//! Deduplicating string interner backed by an [`Arena`].
//!
//! Ids are dense, 0-based, and handed out in first-seen order. Lookup goes
//! through a content-hash index; equality is exact byte comparison.

use crate::arena::{Arena, Slice};
use crate::list::GrowableList;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;

/// Stored after every interned string; not counted in its length.
const TERMINATOR: u8 = 0;

pub struct Interner {
    arena: Arena,
    strs: GrowableList<Slice>,
    /// Content hash to the first id carrying that hash.
    index: FxHashMap<u64, u32>,
    /// Later ids whose hash collided with an earlier, different string.
    collisions: FxHashMap<u64, Vec<u32>>,
}

impl Interner {
    pub fn with_capacity(arena_capacity: usize, entries: usize) -> Self {
        let mut index = FxHashMap::default();
        index.reserve(entries);
        Self {
            arena: Arena::with_capacity(arena_capacity),
            strs: GrowableList::with_capacity(entries),
            index,
            collisions: FxHashMap::default(),
        }
    }

    /// Returns the id of `bytes`, adding it if it has not been seen before.
    pub fn intern(&mut self, bytes: &[u8]) -> u32 {
        let hash = content_hash(bytes);
        if let Some(id) = self.find(hash, bytes) {
            return id;
        }

        let offset = self.arena.push(bytes);
        self.arena.push(&[TERMINATOR]);

        let id = self.strs.len() as u32;
        self.strs.push(Slice::new(offset, bytes.len() as u32));

        if self.index.contains_key(&hash) {
            self.collisions.entry(hash).or_default().push(id);
        } else {
            self.index.insert(hash, id);
        }
        id
    }

    /// Id of `bytes` if already interned.
    pub fn lookup(&self, bytes: &[u8]) -> Option<u32> {
        self.find(content_hash(bytes), bytes)
    }

    fn find(&self, hash: u64, bytes: &[u8]) -> Option<u32> {
        let first = *self.index.get(&hash)?;
        if self.get(first) == bytes {
            return Some(first);
        }
        self.collisions
            .get(&hash)?
            .iter()
            .copied()
            .find(|&id| self.get(id) == bytes)
    }

    /// Bytes of the string with id `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never returned by this interner.
    pub fn get(&self, id: u32) -> &[u8] {
        self.arena.get(self.strs[id as usize])
    }

    /// Arena location of the string with id `id`.
    pub fn slice(&self, id: u32) -> Option<Slice> {
        self.strs.get(id as usize).copied()
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.strs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strs.is_empty()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Strings in id order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.strs.iter().map(move |slice| self.arena.get(*slice))
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::with_capacity(
            crate::config::INITIAL_ARENA_CAPACITY,
            crate::config::INITIAL_LIST_CAPACITY,
        )
    }
}

fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.write_usize(bytes.len());
    hasher.finish()
}
