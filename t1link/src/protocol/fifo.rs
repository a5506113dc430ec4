// t1link/src/protocol/fifo.rs
//! Fixed-capacity circular byte queue staging encoded outbound blocks.
//!
//! There is deliberately no error path on `push`: the engine checks
//! `free_space` before enqueueing a whole chain, and treats "does not fit"
//! as an internal error on its side. One backing slot stays unused so a
//! full queue and an empty queue have distinct head/tail positions.

/// Non-destructive read position handed out by [`Fifo::cursor`].
#[derive(Debug, Clone, Copy)]
pub struct Cursor(usize);

/// Index-based ring buffer over fixed backing storage.
#[derive(Debug)]
pub struct Fifo {
    buf: Vec<u8>,
    head: usize,
    tail: usize,
}

impl Fifo {
    /// Allocate backing storage of `capacity` bytes. Usable space is
    /// `capacity - 1`.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "fifo capacity must be at least 2");
        Self {
            buf: vec![0; capacity],
            head: 0,
            tail: 0,
        }
    }

    fn next_index(&self, idx: usize) -> usize {
        (idx + 1) % self.buf.len()
    }

    /// Bytes currently queued
    pub fn used_space(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.buf.len() - self.tail + self.head
        }
    }

    /// Bytes that can still be pushed
    pub fn free_space(&self) -> usize {
        self.buf.len() - 1 - self.used_space()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Append one byte at the head. Caller must have checked `free_space`.
    pub fn push(&mut self, byte: u8) {
        debug_assert!(self.free_space() >= 1, "fifo overflow");
        self.buf[self.head] = byte;
        self.head = self.next_index(self.head);
    }

    /// Append a slice at the head. Caller must have checked `free_space`.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(self.free_space() >= bytes.len(), "fifo overflow");
        for &b in bytes {
            self.buf[self.head] = b;
            self.head = self.next_index(self.head);
        }
    }

    /// Remove and return the byte at the tail
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let b = self.buf[self.tail];
        self.tail = self.next_index(self.tail);
        Some(b)
    }

    /// Remove up to `out.len()` bytes from the tail, returning how many
    /// were copied.
    pub fn pop_bytes(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.used_space());
        for slot in out.iter_mut().take(n) {
            *slot = self.buf[self.tail];
            self.tail = self.next_index(self.tail);
        }
        n
    }

    /// A cursor positioned at the tail, for non-destructive reads
    pub fn cursor(&self) -> Cursor {
        Cursor(self.tail)
    }

    /// Read the byte under `cursor` and advance it, without consuming.
    /// Returns None once the cursor reaches the head.
    pub fn peek_with_cursor(&self, cursor: &mut Cursor) -> Option<u8> {
        if cursor.0 == self.head {
            return None;
        }
        let b = self.buf[cursor.0];
        cursor.0 = self.next_index(cursor.0);
        Some(b)
    }

    /// Advance the tail by `n` bytes without copying (bulk discard after
    /// acknowledgement). `n` is clamped to the queued amount.
    pub fn remove(&mut self, n: usize) {
        let n = n.min(self.used_space());
        self.tail = (self.tail + n) % self.buf.len();
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.tail = self.head;
    }
}
