//! Lock-free byte ring between the network side and the device callback
//!
//! Single producer (the data loop) and single consumer (the cpal callback).
//! Free space is what the server announces to clients, so the ring is the
//! device buffer as far as flow control is concerned.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded queue of raw sample bytes
pub struct ByteRing {
    queue: ArrayQueue<u8>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl ByteRing {
    /// Create a new ring with room for `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push as many bytes as fit, returning how many were accepted.
    /// Rejected bytes are counted as overflow.
    pub fn push_slice(&self, bytes: &[u8]) -> usize {
        for (written, &byte) in bytes.iter().enumerate() {
            if self.queue.push(byte).is_err() {
                self.overflow_count
                    .fetch_add(bytes.len() - written, Ordering::Relaxed);
                return written;
            }
        }
        bytes.len()
    }

    /// Pop one byte, counting an underrun when empty
    pub fn pop(&self) -> Option<u8> {
        match self.queue.pop() {
            Some(byte) => Some(byte),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting underrun
    pub fn try_pop(&self) -> Option<u8> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Free space in bytes
    pub fn available(&self) -> usize {
        self.capacity() - self.len()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }

    /// Decode the next sample as a float in [-1, 1).
    ///
    /// Samples are signed; 16-bit samples are big-endian. An empty ring
    /// yields silence.
    pub fn next_sample(&self, sample_bytes: usize) -> f32 {
        let Some(first) = self.pop() else {
            return 0.0;
        };
        match sample_bytes {
            2 => {
                let second = self.try_pop().unwrap_or(0);
                i16::from_be_bytes([first, second]) as f32 / 32768.0
            }
            _ => first as i8 as f32 / 128.0,
        }
    }
}

/// Thread-safe handle to a byte ring
pub type SharedByteRing = Arc<ByteRing>;

/// Create a new shared byte ring
pub fn create_shared_ring(capacity: usize) -> SharedByteRing {
    Arc::new(ByteRing::new(capacity))
}
