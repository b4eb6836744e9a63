/// Shrinking view over a caller-owned buffer.
///
/// Positions are absolute indices into the underlying buffer, so a position
/// found while scanning can be handed back to the buffer's owner unchanged.
/// The view only ever moves forward.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    start: usize,
    remaining: usize,
}

impl<'a> Cursor<'a> {
    /// View over the whole of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            start: 0,
            remaining: buf.len(),
        }
    }

    /// View over `buf[start..end]`, keeping positions relative to `buf`.
    ///
    /// # Panics
    ///
    /// Panics if the range lies outside `buf`.
    pub fn segment(buf: &'a [u8], start: usize, end: usize) -> Self {
        assert!(
            start <= end && end <= buf.len(),
            "cursor segment {}..{} outside buffer of {} bytes",
            start,
            end,
            buf.len()
        );
        Self {
            buf,
            start,
            remaining: end - start,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last byte of the view.
    pub fn end(&self) -> usize {
        self.start + self.remaining
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Unconsumed bytes.
    pub fn bytes(&self) -> &'a [u8] {
        &self.buf[self.start..self.end()]
    }

    /// The whole buffer the view was built over.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    /// Byte at absolute `position` if it is still inside the view.
    pub fn byte_at(&self, position: usize) -> Option<u8> {
        if position >= self.start && position < self.end() {
            Some(self.buf[position])
        } else {
            None
        }
    }

    /// Absolute position of the next `needle` at or after `from`.
    pub fn find_from(&self, from: usize, needle: u8) -> Option<usize> {
        if from >= self.end() {
            return None;
        }
        let from = from.max(self.start);
        memchr::memchr(needle, &self.buf[from..self.end()]).map(|i| from + i)
    }

    /// Absolute position of the next `needle` in the view.
    pub fn find(&self, needle: u8) -> Option<usize> {
        self.find_from(self.start, needle)
    }

    /// Marks every byte before `new_start` as consumed.
    ///
    /// # Panics
    ///
    /// Panics if `new_start` is behind the current start or past the end of
    /// the view.
    pub fn advance_to(&mut self, new_start: usize) {
        assert!(
            new_start >= self.start,
            "advance_to called with unrelated or backwards position {} (cursor at {})",
            new_start,
            self.start
        );
        let diff = new_start - self.start;
        assert!(
            diff <= self.remaining,
            "advance_to position {} out of bounds (cursor ends at {})",
            new_start,
            self.end()
        );
        self.start = new_start;
        self.remaining -= diff;
    }
}
