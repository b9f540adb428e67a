//! Reusable decode buffer pool.
//!
//! Full-resolution decodes write into recycled byte buffers instead of
//! allocating fresh pixel storage per tile. The pool is shared across the
//! worker pool; checkout hands out an exclusive buffer, and the consumer
//! gives the backing storage back once a tile has been composited.
//!
//! The pool is optional. Without one, full-resolution decodes simply
//! allocate.

use std::sync::Mutex;

/// A bounded stack of reusable decode buffers.
///
/// `checkout` pops a recycled buffer or allocates a fresh one when the pool
/// is empty, so the pool never blocks a worker. `give_back` recycles a
/// buffer unless the pool is already at capacity, which bounds the memory
/// retained across decodes.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    buffer_capacity: usize,
}

impl BufferPool {
    /// Creates a pool retaining up to `max_pooled` buffers, each
    /// pre-allocated to `buffer_capacity` bytes.
    ///
    /// `buffer_capacity` should match the expected decoded tile size, e.g.
    /// `256 * 256 * 4` for 256 px RGBA tiles; decodes grow the buffer if an
    /// image needs more.
    pub fn new(max_pooled: usize, buffer_capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
            max_pooled,
            buffer_capacity,
        }
    }

    /// Takes an exclusive buffer out of the pool, allocating if empty.
    pub fn checkout(&self) -> Vec<u8> {
        let recycled = self.buffers.lock().expect("buffer pool poisoned").pop();
        recycled.unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity))
    }

    /// Returns a buffer to the pool, making it eligible for reuse.
    ///
    /// Dropped silently when the pool is already at capacity.
    pub fn give_back(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        let mut buffers = self.buffers.lock().expect("buffer pool poisoned");
        if buffers.len() < self.max_pooled {
            buffers.push(buffer);
        }
    }

    /// Number of buffers currently held by the pool.
    pub fn pooled(&self) -> usize {
        self.buffers.lock().expect("buffer pool poisoned").len()
    }
}
