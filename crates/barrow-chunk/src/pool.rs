//! Reusable chunk buffer pool.
//!
//! Every encrypt/decrypt swaps a scratch buffer in and out of a chunk, and
//! with chunks in the tens of megabytes the allocation churn would dominate
//! a backup. The pool is bounded and never blocks: acquire falls back to a
//! fresh allocation when empty, release discards when full.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::info;

/// How many buffers the pool retains per unit of available parallelism.
const BUFFERS_PER_CPU: usize = 16;

/// A bounded pool of growable byte buffers. Handles are cheap to clone and
/// share one pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity: usize,
}

impl BufferPool {
    /// A pool sized for the machine: 16 buffers per usable core.
    pub fn new() -> Self {
        let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::with_capacity(cpus * BUFFERS_PER_CPU)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffers: Mutex::new(Vec::new()),
                capacity,
            }),
        }
    }

    /// Hand out a pooled buffer, or allocate a fresh one when the pool is
    /// empty. Never blocks.
    pub fn acquire(&self) -> Vec<u8> {
        self.inner.buffers.lock().pop().unwrap_or_default()
    }

    /// Return a buffer. When the pool is full the buffer is dropped, which
    /// is a soft condition, not an error.
    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut buffers = self.inner.buffers.lock();
        if buffers.len() < self.inner.capacity {
            buffers.push(buffer);
        } else {
            info!(
                capacity = self.inner.capacity,
                "discarding a free chunk buffer due to a full pool"
            );
        }
    }

    /// How many buffers are currently parked in the pool.
    pub fn pooled(&self) -> usize {
        self.inner.buffers.lock().len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
