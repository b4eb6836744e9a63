//! Append-only byte arena addressed by offsets.
//!
//! Growth may move the backing storage, so callers hold [`Slice`] values and
//! resolve them through the arena on every access.

use serde::{Deserialize, Serialize};

/// Relative reference into an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slice {
    pub offset: u32,
    pub length: u32,
}

impl Slice {
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    data: Vec<u8>,
    capacity: usize,
}

impl Arena {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes used.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes allocated. Always at least `len()`.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies `bytes` to the end of the arena and returns their offset.
    ///
    /// Capacity doubles until the append fits; bytes already stored keep
    /// their offsets.
    ///
    /// # Panics
    ///
    /// Panics if the arena would outgrow `u32` offsets.
    pub fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.data.len();
        let end = offset + bytes.len();
        assert!(
            end <= u32::MAX as usize,
            "arena exhausted: {} bytes exceeds u32 offsets",
            end
        );

        if end >= self.capacity {
            while end >= self.capacity {
                self.capacity *= 2;
            }
            self.data.reserve_exact(self.capacity - offset);
        }

        self.data.extend_from_slice(bytes);
        offset as u32
    }

    /// Read view of the bytes `slice` addresses.
    ///
    /// # Panics
    ///
    /// Panics if `slice` was not produced by this arena.
    pub fn get(&self, slice: Slice) -> &[u8] {
        &self.data[slice.range()]
    }

    /// All bytes stored so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
