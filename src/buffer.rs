//! Fixed-capacity, resumable I/O buffer.
//!
//! Unlike the old `BufferSet`'s growable `Vec<u8>`, a [`ByteBuffer`] never
//! reallocates. Writers fill it until it runs out of room and report that
//! back instead of blocking; a driver loop (see [`crate::driver`]) flushes
//! the filled region to the transport and re-enters. Readers are the mirror
//! image: they report "need more bytes" and the driver loop refills.

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, I64 as I64BE};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// A fixed-capacity buffer with independent read/write cursors.
///
/// Invariant: `0 <= read_pos <= filled_end <= write_pos <= capacity` is
/// *not* required in general — write and read sides are driven
/// independently by the caller (a buffer used purely for writing never
/// touches `read_pos`/`filled_end`, and vice versa). Within a single role
/// the documented invariant is `read_pos <= filled_end` (read side) or
/// `write_pos <= capacity` (write side).
#[derive(Debug)]
pub struct ByteBuffer {
    data: Vec<u8>,
    /// Next byte to hand to a reader.
    read_pos: usize,
    /// End of bytes available to a reader (filled by the last refill).
    filled_end: usize,
    /// Next byte a writer will fill.
    write_pos: usize,
}

impl ByteBuffer {
    /// Allocate a new buffer with the given fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            read_pos: 0,
            filled_end: 0,
            write_pos: 0,
        }
    }

    /// Total fixed capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes a writer may still fill before the buffer needs flushing.
    pub fn write_space_left(&self) -> usize {
        self.capacity() - self.write_pos
    }

    /// Bytes available to a reader before the buffer needs refilling.
    pub fn read_bytes_left(&self) -> usize {
        self.filled_end - self.read_pos
    }

    /// Reset both cursors to the start. Used when recycling a buffer
    /// through the pool, and by the driver loop once a flush/refill
    /// consumed the entire filled region.
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.filled_end = 0;
        self.write_pos = 0;
    }

    // --- write side -------------------------------------------------

    /// Bytes written so far, ready to be handed to the transport.
    pub fn filled_for_flush(&self) -> &[u8] {
        &self.data[..self.write_pos]
    }

    /// Called by the driver loop after the transport has accepted
    /// `filled_for_flush()` in full.
    pub fn mark_flushed(&mut self) {
        self.write_pos = 0;
    }

    fn write_slot(&mut self, len: usize) -> Option<&mut [u8]> {
        if self.write_space_left() < len {
            return None;
        }
        let start = self.write_pos;
        self.write_pos += len;
        Some(&mut self.data[start..self.write_pos])
    }

    /// Write a big-endian `i16`. Returns `false` (no bytes written) if the
    /// buffer does not have room.
    #[must_use]
    pub fn put_i16_be(&mut self, value: i16) -> bool {
        match self.write_slot(2) {
            Some(slot) => {
                slot.copy_from_slice(I16BE::new(value).as_bytes());
                true
            }
            None => false,
        }
    }

    /// Write a big-endian `i32`.
    #[must_use]
    pub fn put_i32_be(&mut self, value: i32) -> bool {
        match self.write_slot(4) {
            Some(slot) => {
                slot.copy_from_slice(I32BE::new(value).as_bytes());
                true
            }
            None => false,
        }
    }

    /// Write a big-endian `i64`.
    #[must_use]
    pub fn put_i64_be(&mut self, value: i64) -> bool {
        match self.write_slot(8) {
            Some(slot) => {
                slot.copy_from_slice(I64BE::new(value).as_bytes());
                true
            }
            None => false,
        }
    }

    /// Write raw bytes verbatim.
    #[must_use]
    pub fn put_bytes(&mut self, bytes: &[u8]) -> bool {
        match self.write_slot(bytes.len()) {
            Some(slot) => {
                slot.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    /// Write a NUL-terminated string.
    #[must_use]
    pub fn put_cstring(&mut self, s: &str) -> bool {
        if self.write_space_left() < s.len() + 1 {
            return false;
        }
        self.put_bytes(s.as_bytes()) && self.put_bytes(&[0])
    }

    // --- read side --------------------------------------------------

    /// Region of the buffer a refiller should write new bytes into.
    pub fn refill_slot(&mut self) -> &mut [u8] {
        let cap = self.capacity();
        &mut self.data[self.filled_end..cap]
    }

    /// Called by the driver loop after the transport produced `n` fresh
    /// bytes into `refill_slot()`.
    pub fn mark_refilled(&mut self, n: usize) {
        self.filled_end += n;
    }

    /// Slide any unconsumed bytes back to the start of the buffer so a
    /// subsequent refill has maximal room. Call only when the caller holds
    /// no outstanding borrows into the buffer.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.data.copy_within(self.read_pos..self.filled_end, 0);
        self.filled_end -= self.read_pos;
        self.read_pos = 0;
    }

    fn read_slice(&mut self, len: usize) -> Option<&[u8]> {
        if self.read_bytes_left() < len {
            return None;
        }
        let start = self.read_pos;
        self.read_pos += len;
        Some(&self.data[start..self.read_pos])
    }

    /// Read a big-endian `i16`, if enough bytes are buffered.
    pub fn get_i16_be(&mut self) -> Option<i16> {
        self.read_slice(2)
            .map(|s| I16BE::ref_from_bytes(s).expect("slice is exactly 2 bytes").get())
    }

    /// Read a big-endian `i32`, if enough bytes are buffered.
    pub fn get_i32_be(&mut self) -> Option<i32> {
        self.read_slice(4)
            .map(|s| I32BE::ref_from_bytes(s).expect("slice is exactly 4 bytes").get())
    }

    /// Borrow `len` raw bytes, if enough are buffered.
    pub fn get_bytes(&mut self, len: usize) -> Option<&[u8]> {
        self.read_slice(len)
    }
}
