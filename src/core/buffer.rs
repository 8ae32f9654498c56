//! Fixed-capacity byte ring buffer
//!
//! Holds raw bytes between a producer and a consumer. When a write does
//! not fit, the oldest unread bytes are dropped first, so the buffer
//! always holds the most recent data.

/// Bounded byte FIFO with drop-oldest overflow
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: Box<[u8]>,
    head: usize,
    len: usize,
}

impl FrameBuffer {
    /// Create a buffer holding at most `capacity` bytes (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of buffered bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Unread bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// No unread bytes?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space before a write has to drop anything
    pub fn available(&self) -> usize {
        self.capacity() - self.len
    }

    /// Append `input`, dropping the oldest bytes to make room.
    ///
    /// If `input` alone exceeds the capacity only its last `capacity`
    /// bytes are kept. Returns the number of bytes lost, old and new.
    pub fn write(&mut self, input: &[u8]) -> usize {
        let cap = self.capacity();
        let mut dropped = 0;

        let input = if input.len() > cap {
            dropped += input.len() - cap;
            &input[input.len() - cap..]
        } else {
            input
        };

        let overflow = (self.len + input.len()).saturating_sub(cap);
        if overflow > 0 {
            self.consume(overflow);
            dropped += overflow;
        }

        let tail = (self.head + self.len) % cap;
        let first = input.len().min(cap - tail);
        self.data[tail..tail + first].copy_from_slice(&input[..first]);
        self.data[..input.len() - first].copy_from_slice(&input[first..]);
        self.len += input.len();

        dropped
    }

    /// Unread bytes as two slices, oldest first
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let cap = self.capacity();
        let first = self.len.min(cap - self.head);
        (
            &self.data[self.head..self.head + first],
            &self.data[..self.len - first],
        )
    }

    /// Move up to `out.len()` of the oldest bytes into `out`
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        let (a, b) = self.as_slices();
        let from_a = n.min(a.len());
        out[..from_a].copy_from_slice(&a[..from_a]);
        out[from_a..n].copy_from_slice(&b[..n - from_a]);
        self.consume(n);
        n
    }

    /// Mark up to `n` of the oldest bytes as read
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.head = (self.head + n) % self.capacity();
        self.len -= n;
        if self.len == 0 {
            self.head = 0;
        }
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Copy of the unread bytes, oldest first
    pub fn to_vec(&self) -> Vec<u8> {
        let (a, b) = self.as_slices();
        [a, b].concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let mut buffer = FrameBuffer::new(8);
        assert_eq!(buffer.write(b"abc"), 0);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.available(), 5);

        let mut out = [0u8; 2];
        assert_eq!(buffer.read_into(&mut out), 2);
        assert_eq!(&out, b"ab");
        assert_eq!(buffer.to_vec(), b"c");
    }

    #[test]
    fn test_wraparound() {
        let mut buffer = FrameBuffer::new(8);
        buffer.write(b"123456");
        buffer.consume(4);
        buffer.write(b"abcdef");
        assert_eq!(buffer.to_vec(), b"56abcdef");

        let (a, b) = buffer.as_slices();
        assert_eq!(a, b"56ab");
        assert_eq!(b, b"cdef");
    }

    #[test]
    fn test_drop_oldest_on_overflow() {
        let mut buffer = FrameBuffer::new(8);
        buffer.write(b"12345678");
        assert_eq!(buffer.write(b"abc"), 3);
        assert_eq!(buffer.to_vec(), b"45678abc");
    }

    #[test]
    fn test_oversized_burst_keeps_tail() {
        let mut buffer = FrameBuffer::new(4);
        buffer.write(b"xy");
        assert_eq!(buffer.write(b"0123456789"), 8);
        assert_eq!(buffer.to_vec(), b"6789");
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_read_into_across_wrap() {
        let mut buffer = FrameBuffer::new(5);
        buffer.write(b"abcd");
        buffer.consume(3);
        buffer.write(b"efgh");

        let mut out = [0u8; 16];
        let n = buffer.read_into(&mut out);
        assert_eq!(&out[..n], b"defgh");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear_and_zero_capacity() {
        let mut buffer = FrameBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.write(b"ab");
        assert_eq!(buffer.to_vec(), b"b");
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
