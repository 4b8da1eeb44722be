//! Reusable frame buffers
//!
//! Buffers handed out by [`BufferPool`] find their way back to the pool when
//! the [`PooledBuffer`] is dropped, so steady-state capture does not allocate
//! per frame.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError, Weak};

struct PoolInner {
    free: Vec<Vec<u8>>,
    max_buffers: usize,
}

/// Bounded pool of byte buffers shared between the converter and frame consumers
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Mutex<PoolInner>>,
}

impl BufferPool {
    pub fn new(max_buffers: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                free: Vec::with_capacity(max_buffers),
                max_buffers,
            })),
        }
    }

    /// Get a zero-filled buffer of exactly `len` bytes
    pub fn acquire(&self, len: usize) -> PooledBuffer {
        let recycled = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free
            .pop();

        let mut data = recycled.unwrap_or_else(|| Vec::with_capacity(len));
        data.clear();
        data.resize(len, 0);

        PooledBuffer {
            data,
            pool: Arc::downgrade(&self.inner),
        }
    }

    /// Number of idle buffers waiting for reuse
    pub fn available(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free
            .len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Buffer on loan from a [`BufferPool`]
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Weak<Mutex<PoolInner>>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let Some(pool) = self.pool.upgrade() else {
            return;
        };
        let mut inner = pool.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.free.len() < inner.max_buffers {
            inner.free.push(std::mem::take(&mut self.data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_buffer_returns_to_pool() {
        let pool = BufferPool::new(2);
        assert_eq!(pool.available(), 0);
        {
            let buffer = pool.acquire(16);
            assert_eq!(buffer.len(), 16);
        }
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_recycled_buffer_is_resized_and_zeroed() {
        let pool = BufferPool::new(1);
        {
            let mut buffer = pool.acquire(8);
            buffer.fill(0xAB);
        }
        let buffer = pool.acquire(4);
        assert_eq!(&buffer[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_pool_capacity_is_bounded() {
        let pool = BufferPool::new(1);
        let a = pool.acquire(4);
        let b = pool.acquire(4);
        drop(a);
        drop(b);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_buffer_outlives_pool() {
        let pool = BufferPool::new(1);
        let buffer = pool.acquire(4);
        drop(pool);
        assert_eq!(buffer.len(), 4);
    }
}
