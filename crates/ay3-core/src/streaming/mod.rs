//! Real-time streaming output.
//!
//! A stereo frame ring buffer decouples the producer (the replayer driver
//! generating samples) from the consumer (the host audio callback). The
//! rodio-backed [`AudioDevice`] pulls frames out of the ring buffer and
//! plays silence on underrun rather than stalling the stream.

mod audio_device;
mod ring_buffer;

pub use audio_device::AudioDevice;
pub use ring_buffer::FrameRingBuffer;
