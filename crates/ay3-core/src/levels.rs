//! Per-channel output level observation.
//!
//! The audio thread stores each channel's latest output magnitude with a
//! plain atomic word store; visualisers read the values from any thread.
//! Readers may observe values from different samples (tearing across
//! channels is accepted), no locking is involved.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::generators::NUM_CHANNELS;

/// Shared handle to the three channel level slots.
///
/// Cloning the handle shares the underlying storage.
#[derive(Clone, Debug, Default)]
pub struct ChannelLevels {
    slots: Arc<[AtomicU32; NUM_CHANNELS]>,
}

impl ChannelLevels {
    /// Create a new level buffer with all channels at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a channel's output magnitude (producer side).
    #[inline]
    pub fn store(&self, channel: usize, level: f32) {
        if channel < NUM_CHANNELS {
            self.slots[channel].store(level.to_bits(), Ordering::Relaxed);
        }
    }

    /// Read the latest levels (consumer side).
    #[inline]
    pub fn load(&self) -> [f32; NUM_CHANNELS] {
        [
            f32::from_bits(self.slots[0].load(Ordering::Relaxed)),
            f32::from_bits(self.slots[1].load(Ordering::Relaxed)),
            f32::from_bits(self.slots[2].load(Ordering::Relaxed)),
        ]
    }
}
