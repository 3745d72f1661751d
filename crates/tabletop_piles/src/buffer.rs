//! Backing-storage strategies for piles.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Decides where a pile's backing buffer comes from and where it goes.
///
/// A pile takes its strategy as a constructor argument and keeps it in a
/// private field with no setter, so the strategy cannot change for the life of
/// the pile.
pub trait BufferStrategy<T>: Send + Sync {
    /// Returns an empty buffer able to hold at least `capacity` items.
    fn acquire(&self, capacity: usize) -> Vec<T>;

    /// Takes back a buffer the pile no longer needs.
    fn release(&self, buffer: Vec<T>);
}

/// Allocates a new buffer for every pile and frees it on drop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fresh;

impl<T> BufferStrategy<T> for Fresh {
    fn acquire(&self, capacity: usize) -> Vec<T> {
        Vec::with_capacity(capacity)
    }

    fn release(&self, buffer: Vec<T>) {
        drop(buffer);
    }
}

/// Reuses buffers released by earlier piles.
///
/// Clones share one pool, so every pile of a game type can draw from the same
/// set of buffers.
#[derive(Debug)]
pub struct Pooled<T> {
    buffers: Arc<Mutex<Vec<Vec<T>>>>,
    max_retained: usize,
}

/// Number of idle buffers a pool keeps unless told otherwise.
const DEFAULT_RETAINED: usize = 32;

impl<T> Pooled<T> {
    /// Creates an empty pool that keeps up to 32 idle buffers.
    #[instrument]
    pub fn new() -> Self {
        Self::with_max_retained(DEFAULT_RETAINED)
    }

    /// Creates an empty pool that keeps up to `max_retained` idle buffers.
    #[instrument]
    pub fn with_max_retained(max_retained: usize) -> Self {
        debug!(max_retained, "Creating buffer pool");
        Self {
            buffers: Arc::new(Mutex::new(Vec::new())),
            max_retained,
        }
    }

    /// Returns the number of idle buffers waiting in the pool.
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl<T> Default for Pooled<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        Self {
            buffers: Arc::clone(&self.buffers),
            max_retained: self.max_retained,
        }
    }
}

impl<T: Send> BufferStrategy<T> for Pooled<T> {
    fn acquire(&self, capacity: usize) -> Vec<T> {
        let reused = self.buffers.lock().pop();
        match reused {
            Some(mut buffer) => {
                trace!(capacity, reused_capacity = buffer.capacity(), "Reusing pooled buffer");
                buffer.reserve(capacity);
                buffer
            }
            None => {
                trace!(capacity, "Pool empty, allocating buffer");
                Vec::with_capacity(capacity)
            }
        }
    }

    fn release(&self, mut buffer: Vec<T>) {
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_retained {
            buffers.push(buffer);
        } else {
            trace!("Pool full, dropping buffer");
        }
    }
}
