//! Pool of reusable [`ByteBuffer`]s.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::buffer::ByteBuffer;

const POOL_CAPACITY: usize = 128;

/// A pooled [`ByteBuffer`] that returns itself to the pool on drop.
pub struct PooledBuffer {
    pool: Arc<BufferPool>,
    inner: ManuallyDrop<ByteBuffer>,
}

impl PooledBuffer {
    fn new(pool: Arc<BufferPool>, buffer: ByteBuffer) -> Self {
        Self {
            pool,
            inner: ManuallyDrop::new(buffer),
        }
    }
}

impl Deref for PooledBuffer {
    type Target = ByteBuffer;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // SAFETY: inner is never accessed after this
        let buffer = unsafe { ManuallyDrop::take(&mut self.inner) };
        self.pool.return_buffer(buffer);
    }
}

/// Pool of fixed-capacity [`ByteBuffer`]s, all allocated at the same
/// capacity. Buffers are recycled (cursors reset, allocation kept) rather
/// than dropped, so a sustained stream of `Bind` calls does not keep
/// allocating.
#[derive(Debug)]
pub struct BufferPool {
    capacity: usize,
    buffers: ArrayQueue<ByteBuffer>,
}

impl BufferPool {
    /// Create a pool that lends out buffers of `capacity` bytes, holding
    /// at most `pool_capacity` idle buffers at once.
    pub fn new(capacity: usize, pool_capacity: usize) -> Self {
        Self {
            capacity,
            buffers: ArrayQueue::new(pool_capacity),
        }
    }

    /// Borrow a buffer, allocating a fresh one if the pool is empty.
    pub fn get(self: &Arc<Self>) -> PooledBuffer {
        let buffer = self
            .buffers
            .pop()
            .unwrap_or_else(|| ByteBuffer::new(self.capacity));
        PooledBuffer::new(Arc::clone(self), buffer)
    }

    fn return_buffer(&self, mut buffer: ByteBuffer) {
        buffer.reset();
        let _ = self.buffers.push(buffer);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(crate::config::Config::default().buffer_capacity, POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_buffer_has_full_capacity() {
        let pool = Arc::new(BufferPool::new(64, 4));
        {
            let mut buf = pool.get();
            assert!(buf.put_i32_be(1));
        }
        let buf = pool.get();
        assert_eq!(buf.write_space_left(), 64);
    }
}
