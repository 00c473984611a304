//! Bounded ring of event records.
//!
//! One buffer per input source. The listener thread is the only writer; the
//! analyzer scans it concurrently. The mutex makes sure a scan never sees the
//! ring halfway through evicting its oldest entry.

use crate::collector::types::EventRecord;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct EventBuffer {
    capacity: usize,
    records: Mutex<VecDeque<EventRecord>>,
    /// Events ever recorded, including evicted ones
    total_recorded: AtomicU64,
}

impl EventBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            total_recorded: AtomicU64::new(0),
        }
    }

    /// Create a shared buffer.
    pub fn shared(capacity: usize) -> SharedEventBuffer {
        Arc::new(Self::new(capacity))
    }

    /// Append a record, silently evicting the oldest one when full.
    pub fn record(&self, event: EventRecord) {
        let mut records = self.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(event);
        self.total_recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of retained records with `timestamp >= threshold`.
    pub fn count_since(&self, threshold: f64) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.timestamp >= threshold)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count of events ever recorded.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded.load(Ordering::Relaxed)
    }

    /// Copy of the retained records, oldest first.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.lock().iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<EventRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Thread-safe shared event buffer.
pub type SharedEventBuffer = Arc<EventBuffer>;

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, count: usize) -> EventBuffer {
        let buffer = EventBuffer::new(capacity);
        for i in 0..count {
            buffer.record(EventRecord::press(i as f64));
        }
        buffer
    }

    #[test]
    fn test_length_tracks_appends_below_capacity() {
        for n in [0, 1, 5, 10] {
            let buffer = filled(10, n);
            assert_eq!(buffer.len(), n);
            assert_eq!(buffer.total_recorded(), n as u64);
        }
    }

    #[test]
    fn test_overflow_keeps_most_recent() {
        let buffer = filled(10, 25);
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.total_recorded(), 25);

        let timestamps: Vec<f64> = buffer.snapshot().iter().map(|e| e.timestamp).collect();
        let expected: Vec<f64> = (15..25).map(|i| i as f64).collect();
        assert_eq!(timestamps, expected);
    }

    #[test]
    fn test_count_since() {
        let buffer = filled(100, 10);

        assert_eq!(buffer.count_since(-1.0), 10);
        assert_eq!(buffer.count_since(0.0), 10);
        assert_eq!(buffer.count_since(4.0), 6);
        assert_eq!(buffer.count_since(4.5), 5);
        assert_eq!(buffer.count_since(9.0), 1);
        assert_eq!(buffer.count_since(1000.0), 0);
    }

    #[test]
    fn test_count_since_only_sees_retained() {
        let buffer = filled(5, 10);
        assert_eq!(buffer.count_since(0.0), 5);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let buffer = EventBuffer::new(0);
        buffer.record(EventRecord::press(1.0));
        buffer.record(EventRecord::press(2.0));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot()[0].timestamp, 2.0);
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        let buffer = EventBuffer::shared(50);

        let writer = {
            let buffer = buffer.clone();
            std::thread::spawn(move || {
                for i in 0..5000 {
                    buffer.record(EventRecord::movement(i as f64));
                }
            })
        };

        for _ in 0..200 {
            assert!(buffer.count_since(0.0) <= 50);
            assert!(buffer.len() <= 50);
        }

        writer.join().unwrap();
        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer.total_recorded(), 5000);
        assert_eq!(buffer.snapshot().last().unwrap().timestamp, 4999.0);
    }
}
