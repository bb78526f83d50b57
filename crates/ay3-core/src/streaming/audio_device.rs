//! Audio device integration using rodio.
//!
//! Plays stereo frames from a [`FrameRingBuffer`] on the system output
//! device. Underruns produce silence so the stream never stalls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};

use super::FrameRingBuffer;
use crate::Result;

/// Rodio source that pulls interleaved stereo samples out of the ring
/// buffer in batches.
struct RingBufferSource {
    ring: FrameRingBuffer,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    /// Batch buffer; refilled from the ring to limit lock traffic.
    batch: Vec<f32>,
    batch_pos: usize,
}

impl RingBufferSource {
    fn new(ring: FrameRingBuffer, sample_rate: u32, finished: Arc<AtomicBool>) -> Self {
        let batch = vec![0.0f32; 4096];
        Self {
            ring,
            sample_rate,
            finished,
            batch_pos: batch.len(),
            batch,
        }
    }
}

impl Iterator for RingBufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.batch_pos >= self.batch.len() {
            if self.finished.load(Ordering::Relaxed) && self.ring.is_empty() {
                return None;
            }
            let read = self.ring.read(&mut self.batch);
            if read == 0 {
                // Underrun: keep the stream alive with silence.
                self.batch.fill(0.0);
            } else if read * 2 < self.batch.len() {
                self.batch[read * 2..].fill(0.0);
            }
            self.batch_pos = 0;
        }

        let sample = self.batch[self.batch_pos];
        self.batch_pos += 1;
        Some(sample)
    }
}

impl Source for RingBufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Stereo audio playback device.
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start pulling frames from the
    /// ring buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PsgError::AudioUnavailable`] when no output device
    /// can be opened.
    pub fn new(sample_rate: u32, ring: FrameRingBuffer) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| crate::PsgError::AudioUnavailable(e.to_string()))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| crate::PsgError::AudioUnavailable(e.to_string()))?;

        let finished = Arc::new(AtomicBool::new(false));
        sink.append(RingBufferSource::new(
            ring,
            sample_rate,
            Arc::clone(&finished),
        ));

        Ok(Self {
            _stream: stream,
            sink,
            finished,
        })
    }

    /// Pause output.
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume output.
    pub fn play(&self) {
        self.sink.play();
    }

    /// Signal that no more frames will be produced; the stream ends once
    /// the ring buffer drains.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// Block until the stream has drained after [`AudioDevice::finish`].
    pub fn wait_until_end(&self) {
        self.sink.sleep_until_end();
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Relaxed);
        self.sink.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_emits_silence_on_underrun() {
        let ring = FrameRingBuffer::new(64).unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let mut source = RingBufferSource::new(ring, 44_100, finished);

        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44_100);
        assert_eq!(source.next(), Some(0.0));
    }

    #[test]
    fn source_ends_after_finish_and_drain() {
        let ring = FrameRingBuffer::new(64).unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let mut source =
            RingBufferSource::new(ring.clone(), 44_100, Arc::clone(&finished));

        ring.write(&[0.5, 0.5]);
        finished.store(true, Ordering::Relaxed);

        // Drains the buffered frame (padded batch), then terminates.
        let mut last = Some(0.0);
        for _ in 0..(4096 + 2) {
            last = source.next();
            if last.is_none() {
                break;
            }
        }
        assert_eq!(last, None);
    }
}
