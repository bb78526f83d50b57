//! Ring buffer for concurrent stereo frame production and playback.
//!
//! One producer thread writes rendered frames, one consumer thread (the
//! audio callback) reads them. Positions are tracked with atomics for
//! cross-thread visibility; the storage itself sits behind a mutex.
//! Capacity is fixed, so memory use does not grow with song length.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Ring buffer of interleaved stereo f32 frames.
#[derive(Clone, Debug)]
pub struct FrameRingBuffer {
    /// Interleaved storage, 2 floats per frame.
    buffer: Arc<Mutex<Vec<f32>>>,
    /// Producer position, in frames.
    write_pos: Arc<AtomicUsize>,
    /// Consumer position, in frames.
    read_pos: Arc<AtomicUsize>,
    /// Capacity in frames (power of two).
    capacity: usize,
    mask: usize,
}

impl FrameRingBuffer {
    /// Create a ring buffer holding at least `requested_frames` stereo
    /// frames. The capacity is rounded up to the next power of two.
    pub fn new(requested_frames: usize) -> crate::Result<Self> {
        if requested_frames == 0 {
            return Err(crate::PsgError::Config(
                "ring buffer capacity must be greater than 0".into(),
            ));
        }

        let capacity = requested_frames.next_power_of_two();

        // 256 MB worth of stereo f32 frames is far beyond any sane stream
        // buffer; treat larger requests as configuration errors.
        const MAX_FRAMES: usize = 256 * 1024 * 1024 / (2 * std::mem::size_of::<f32>());
        if capacity > MAX_FRAMES {
            return Err(crate::PsgError::Config(format!(
                "ring buffer capacity {capacity} exceeds maximum of {MAX_FRAMES} frames"
            )));
        }

        Ok(Self {
            buffer: Arc::new(Mutex::new(vec![0.0; capacity * 2])),
            write_pos: Arc::new(AtomicUsize::new(0)),
            read_pos: Arc::new(AtomicUsize::new(0)),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Capacity in frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames available to read without blocking.
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Frames that can be written without overwriting unread data.
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read() - 1
    }

    /// Write interleaved frames (slice length must be even). Returns the
    /// number of frames accepted; 0 when the buffer is full.
    pub fn write(&self, interleaved: &[f32]) -> usize {
        debug_assert!(interleaved.len() % 2 == 0);
        let frames = interleaved.len() / 2;

        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let used = write_pos.wrapping_sub(read_pos);
        let available = self.capacity - used - 1;

        let to_write = frames.min(available);
        if to_write == 0 {
            return 0;
        }

        for i in 0..to_write {
            let slot = (write_pos.wrapping_add(i)) & self.mask;
            buf[slot * 2] = interleaved[i * 2];
            buf[slot * 2 + 1] = interleaved[i * 2 + 1];
        }

        drop(buf);
        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Read frames into an interleaved buffer (length must be even).
    /// Returns the number of frames read.
    pub fn read(&self, dest: &mut [f32]) -> usize {
        debug_assert!(dest.len() % 2 == 0);
        let frames = dest.len() / 2;

        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let available = write_pos.wrapping_sub(read_pos);

        let to_read = frames.min(available);
        if to_read == 0 {
            return 0;
        }

        for i in 0..to_read {
            let slot = (read_pos.wrapping_add(i)) & self.mask;
            dest[i * 2] = buf[slot * 2];
            dest[i * 2 + 1] = buf[slot * 2 + 1];
        }

        drop(buf);
        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Drop all buffered frames.
    pub fn flush(&self) {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }

    /// Whether any frames are buffered.
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_frames() {
        let ring = FrameRingBuffer::new(16).unwrap();
        let frames = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        assert_eq!(ring.write(&frames), 3);
        assert_eq!(ring.available_read(), 3);

        let mut dest = [0.0f32; 6];
        assert_eq!(ring.read(&mut dest), 3);
        assert_eq!(dest, frames);
        assert!(ring.is_empty());
    }

    #[test]
    fn wraps_around() {
        let ring = FrameRingBuffer::new(8).unwrap();
        let chunk = [1.0f32; 12]; // 6 frames

        assert_eq!(ring.write(&chunk), 6);
        let mut dest = [0.0f32; 8];
        assert_eq!(ring.read(&mut dest), 4);

        // Write again across the wrap point.
        assert_eq!(ring.write(&chunk[..10]), 5);
        let mut rest = [0.0f32; 16];
        assert_eq!(ring.read(&mut rest), 7);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(FrameRingBuffer::new(0).is_err());
    }

    #[test]
    fn full_buffer_rejects_writes() {
        let ring = FrameRingBuffer::new(4).unwrap();
        // Capacity 4 keeps one frame gap: 3 writable.
        assert_eq!(ring.write(&[0.0; 8]), 3);
        assert_eq!(ring.write(&[0.0; 2]), 0);
    }

    #[test]
    fn flush_discards_everything() {
        let ring = FrameRingBuffer::new(8).unwrap();
        ring.write(&[0.5; 6]);
        assert!(!ring.is_empty());
        ring.flush();
        assert!(ring.is_empty());
    }
}
