//! Multi-PSG bank.
//!
//! TurboSound rigs drive two AY/YM chips from one bus; the bank owns the
//! chips, routes register writes by chip index and mixes their stereo
//! outputs.

use crate::chip::Psg;
use crate::queue::RegisterWrite;

/// A bank of one or more PSG chips.
///
/// Channels are numbered per chip; register writes address a chip by
/// index. The mixed output is the average of all chip outputs, so the
/// stereo magnitude bound of a single chip is preserved.
#[derive(Debug, Clone)]
pub struct PsgBank {
    chips: Vec<Psg>,
}

impl PsgBank {
    /// Create a bank of `count` chips with the same clocks.
    ///
    /// # Panics
    ///
    /// Panics if `count` is 0.
    pub fn new(count: usize, master_clock: u32, sample_rate: u32) -> Self {
        assert!(count > 0, "PSG bank must have at least one chip");
        Self {
            chips: (0..count)
                .map(|_| Psg::with_clocks(master_clock, sample_rate))
                .collect(),
        }
    }

    /// Number of chips in the bank.
    #[inline]
    pub fn psg_count(&self) -> usize {
        self.chips.len()
    }

    /// Shared reference to a chip.
    #[inline]
    pub fn chip(&self, index: usize) -> &Psg {
        &self.chips[index]
    }

    /// Mutable reference to a chip.
    #[inline]
    pub fn chip_mut(&mut self, index: usize) -> &mut Psg {
        &mut self.chips[index]
    }

    /// Write a register on one chip. Out-of-range chip indices are
    /// ignored.
    #[inline]
    pub fn write_register(&mut self, psg: usize, register: u8, value: u8) {
        if let Some(chip) = self.chips.get_mut(psg) {
            chip.write_register(register, value);
        }
    }

    /// Apply a queued register write message.
    #[inline]
    pub fn apply(&mut self, write: RegisterWrite) {
        self.write_register(write.psg as usize, write.register, write.value);
    }

    /// Set the master volume on every chip.
    pub fn set_master_volume(&mut self, volume: f32) {
        for chip in &mut self.chips {
            chip.set_master_volume(volume);
        }
    }

    /// Set a channel's pan on every chip (TurboSound mirrors the channel
    /// layout across both chips).
    pub fn set_channel_pan(&mut self, channel: usize, pan: f32) {
        for chip in &mut self.chips {
            chip.set_channel_pan(channel, pan);
        }
    }

    /// Render one mixed stereo frame.
    pub fn render_frame(&mut self) -> (f32, f32) {
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for chip in &mut self.chips {
            let (l, r) = chip.render_frame();
            left += l;
            right += r;
        }
        let scale = 1.0 / self.chips.len() as f32;
        (left * scale, right * scale)
    }

    /// Render interleaved stereo frames into a buffer (length must be
    /// even).
    pub fn generate_frames_into(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = self.render_frame();
            frame[0] = left;
            frame[1] = right;
        }
    }

    /// Reset every chip.
    pub fn reset(&mut self) {
        for chip in &mut self.chips {
            chip.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_routes_writes_by_chip() {
        let mut bank = PsgBank::new(2, 2_000_000, 44_100);
        bank.write_register(0, 8, 0x0F);
        bank.write_register(1, 8, 0x0A);
        assert_eq!(bank.chip(0).read_register(8), 0x0F);
        assert_eq!(bank.chip(1).read_register(8), 0x0A);
    }

    #[test]
    fn mixed_output_stays_bounded() {
        let mut bank = PsgBank::new(2, 2_000_000, 44_100);
        for psg in 0..2 {
            bank.write_register(psg, 7, 0x38);
            for reg in 8..11 {
                bank.write_register(psg, reg, 0x0F);
            }
        }
        for _ in 0..500 {
            let (l, r) = bank.render_frame();
            assert!(l.abs() <= 1.0 && r.abs() <= 1.0);
        }
    }

    #[test]
    #[should_panic(expected = "at least one chip")]
    fn empty_bank_panics() {
        PsgBank::new(0, 2_000_000, 44_100);
    }
}
