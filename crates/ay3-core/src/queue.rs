//! Cross-thread register write queue.
//!
//! The replayer driver runs at the song's frame rate and posts register
//! writes; the audio actor drains them, in order, at the start of its next
//! buffer. A single driver posting into a single audio actor preserves the
//! total order of writes within and across frames.
//!
//! The queue is bounded: a full queue rejects the write rather than
//! blocking either actor.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// One register write destined for a chip in a [`crate::PsgBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Target chip index within the bank (0 for single-chip playback).
    pub psg: u8,
    /// Register number (0-15).
    pub register: u8,
    /// Value to write.
    pub value: u8,
}

/// Bounded FIFO of register writes between the driver and the audio actor.
///
/// Cloning the queue shares the underlying storage.
#[derive(Debug, Clone)]
pub struct RegisterQueue {
    inner: Arc<Mutex<VecDeque<RegisterWrite>>>,
    capacity: usize,
}

impl RegisterQueue {
    /// Create a queue holding at most `capacity` pending writes.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(16);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Post a register write. Returns `false` if the queue is full.
    pub fn push(&self, write: RegisterWrite) -> bool {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(write);
        true
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drain all pending writes, in posting order, into `apply`.
    pub fn drain(&self, mut apply: impl FnMut(RegisterWrite)) {
        let drained: Vec<RegisterWrite> = {
            let mut queue = self.inner.lock();
            queue.drain(..).collect()
        };
        for write in drained {
            apply(write);
        }
    }

    /// Discard all pending writes (used on stop/dispose so no in-flight
    /// message lands on a reset chip).
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order() {
        let queue = RegisterQueue::new(64);
        for value in 0..10u8 {
            assert!(queue.push(RegisterWrite {
                psg: 0,
                register: 8,
                value,
            }));
        }

        let mut seen = Vec::new();
        queue.drain(|w| seen.push(w.value));
        assert_eq!(seen, (0..10).collect::<Vec<u8>>());
        assert!(queue.is_empty());
    }

    #[test]
    fn rejects_when_full() {
        let queue = RegisterQueue::new(16);
        for _ in 0..16 {
            assert!(queue.push(RegisterWrite {
                psg: 0,
                register: 0,
                value: 0,
            }));
        }
        assert!(!queue.push(RegisterWrite {
            psg: 0,
            register: 0,
            value: 0,
        }));
    }

    #[test]
    fn clones_share_queue() {
        let a = RegisterQueue::new(32);
        let b = a.clone();
        a.push(RegisterWrite {
            psg: 1,
            register: 7,
            value: 0x38,
        });
        assert_eq!(b.len(), 1);
    }
}
