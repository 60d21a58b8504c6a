//! Bounded pool of reusable copy buffers shared by all in-flight requests.
//!
//! Buffers never exceed `chunk_size` bytes and at most `max_pooled` idle
//! buffers are retained. A [`PooledBuffer`] returns itself to the pool when
//! dropped, so success, error and cancellation paths all give capacity back.

use parking_lot::Mutex;
use serde::Serialize;
use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Idle buffers ready for reuse.
    pub available: usize,
    /// Buffers currently held by requests.
    pub outstanding: usize,
    /// Acquisitions served from an idle buffer.
    pub hits: u64,
    /// Acquisitions that had to allocate.
    pub misses: u64,
}

/// Cheaply cloneable handle to the shared pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    buffers: Mutex<Vec<Vec<u8>>>,
    chunk_size: usize,
    max_pooled: usize,
    outstanding: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BufferPool {
    /// Create a pool handing out buffers of at most `chunk_size` bytes and
    /// keeping at most `max_pooled` idle buffers.
    pub fn new(chunk_size: usize, max_pooled: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffers: Mutex::new(Vec::with_capacity(max_pooled)),
                chunk_size: chunk_size.max(1),
                max_pooled,
                outstanding: AtomicUsize::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Take a buffer of `min(len, chunk_size)` bytes.
    ///
    /// Reuses an idle buffer when one is available; its contents are
    /// unspecified and must be overwritten by the caller.
    pub fn acquire(&self, len: usize) -> PooledBuffer {
        let len = len.min(self.inner.chunk_size);
        let pooled = self.inner.buffers.lock().pop();
        let mut buf = match pooled {
            Some(buf) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(len)
            }
        };
        buf.clear();
        buf.reserve_exact(len);
        buf.resize(len, 0);
        self.inner.outstanding.fetch_add(1, Ordering::Relaxed);

        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.inner.buffers.lock().len(),
            outstanding: self.inner.outstanding.load(Ordering::Relaxed),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("chunk_size", &self.inner.chunk_size)
            .field("max_pooled", &self.inner.max_pooled)
            .field("stats", &self.stats())
            .finish()
    }
}

impl PoolInner {
    fn release(&self, buf: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        if buf.capacity() > self.chunk_size {
            return;
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buf);
        }
        // else: drop the buffer
    }
}

/// A buffer on loan from a [`BufferPool`].
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
