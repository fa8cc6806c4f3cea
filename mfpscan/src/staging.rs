//! Bounded buffer between transport reads and the scan-data decoder

/// Fixed-capacity byte buffer
///
/// Transport reads land in [`spare_mut`](Self::spare_mut) and are committed
/// at the tail. The decoder reads [`data`](Self::data) from the head and
/// [`consume`](Self::consume) shifts what it left to the front.
#[derive(Debug)]
pub struct StagingBuffer {
    buf: Vec<u8>,
    len: usize,
}

impl StagingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Bytes waiting to be decoded
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Free space at the tail
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// Mark `n` bytes written into the spare space as data
    pub fn commit(&mut self, n: usize) {
        self.len = (self.len + n).min(self.buf.len());
    }

    /// Drop `n` bytes from the head and compact
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        if n == 0 {
            return;
        }
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }
}
