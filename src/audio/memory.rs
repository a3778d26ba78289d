//! In-memory sink for headless hosts and tests

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::device::AudioSink;
use crate::error::AudioError;
use crate::protocol::ServerInfo;

/// Sink that records every byte written to it.
///
/// Clones share the same recording, so a test can keep one handle while the
/// server owns another. Free space is fixed: the device never fills up.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    recorded: Mutex<Vec<u8>>,
    info: Mutex<Option<ServerInfo>>,
    /// Fixed free space; one second of audio when zero
    capacity: AtomicUsize,
    writes: AtomicUsize,
    started: AtomicBool,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that always reports `capacity` bytes of free space
    pub fn with_capacity(capacity: usize) -> Self {
        let sink = Self::default();
        sink.inner.capacity.store(capacity, Ordering::Relaxed);
        sink
    }

    /// Copy of all bytes written so far
    pub fn recorded(&self) -> Vec<u8> {
        self.inner.recorded.lock().clone()
    }

    /// Number of bytes written so far
    pub fn recorded_len(&self) -> usize {
        self.inner.recorded.lock().len()
    }

    /// Number of write calls
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Format passed to `open`, if any
    pub fn info(&self) -> Option<ServerInfo> {
        *self.inner.info.lock()
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl AudioSink for MemorySink {
    fn open(&mut self, info: &ServerInfo) -> Result<(), AudioError> {
        *self.inner.info.lock() = Some(*info);
        let _ = self.inner.capacity.compare_exchange(
            0,
            info.bytes_per_second(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        self.inner.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.inner.info.lock().is_none() {
            return Err(AudioError::NotOpen);
        }
        self.inner.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, AudioError> {
        if self.inner.info.lock().is_none() || self.is_closed() {
            return Err(AudioError::NotOpen);
        }
        self.inner.recorded.lock().extend_from_slice(bytes);
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        Ok(bytes.len())
    }

    fn available(&self) -> usize {
        self.inner.capacity.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        self.inner.started.store(false, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.stop();
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records() {
        let handle = MemorySink::new();
        let mut sink = handle.clone();

        assert!(matches!(sink.write(&[1]), Err(AudioError::NotOpen)));
        assert!(matches!(sink.start(), Err(AudioError::NotOpen)));

        sink.open(&ServerInfo::default()).unwrap();
        sink.start().unwrap();
        assert!(handle.is_started());
        assert_eq!(sink.available(), 40960);

        sink.write(&[1, 2]).unwrap();
        sink.write(&[3]).unwrap();
        assert_eq!(handle.recorded(), vec![1, 2, 3]);
        assert_eq!(handle.write_count(), 2);

        sink.close();
        assert!(handle.is_closed());
        assert!(!handle.is_started());
        assert!(sink.write(&[4]).is_err());
    }

    #[test]
    fn test_fixed_capacity() {
        let mut sink = MemorySink::with_capacity(256);
        sink.open(&ServerInfo::default()).unwrap();
        assert_eq!(sink.available(), 256);
        assert_eq!(sink.info(), Some(ServerInfo::default()));
    }
}
