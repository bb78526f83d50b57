//! PSG emulation core.
//!
//! Sample-accurate AY-3-8910/YM2149 emulation operating at the internal
//! clock rate of master_clock / 8 (250 kHz on a 2 MHz Atari ST, ~221 kHz on
//! a ZX Spectrum 128). A fractional tick accumulator carries the exact
//! internal-clock/sample-rate ratio across output samples, so long-run
//! timing does not drift.
//!
//! Tone and noise outputs are OR-accumulated over the internal ticks that
//! make up one output sample: a tone faster than the audio Nyquist degrades
//! to a sustained "1" instead of aliasing.

use crate::generators::{EnvelopeGenerator, NoiseGenerator, ToneGenerator, NUM_CHANNELS};
use crate::levels::ChannelLevels;
use crate::tables::{REG_MASK, VOLUME_TABLE};

/// Default Atari ST master clock (2 MHz).
const DEFAULT_MASTER_CLOCK: u32 = 2_000_000;

/// Default audio sample rate (44.1 kHz).
const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Number of PSG registers.
pub const NUM_REGISTERS: usize = 16;

/// Equal-power pan gains for a pan position in [-1, +1].
#[inline]
fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * core::f32::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// AY-3-8910/YM2149 Programmable Sound Generator emulator.
///
/// Produces one stereo f32 frame per output sample by running the three
/// tone generators, the 17-bit LFSR noise generator and the envelope
/// generator at the internal clock, combining them through the chip's
/// AND-gate mixer topology, and panning each channel with equal-power
/// gains.
///
/// # Example
///
/// ```
/// use ay3::Psg;
///
/// let mut psg = Psg::new();
/// psg.write_register(0, 0xFE); // Tone A period low
/// psg.write_register(1, 0x00); // Tone A period high
/// psg.write_register(8, 0x0F); // Volume A
/// psg.write_register(7, 0x3E); // Mixer: tone A enabled
///
/// let (left, right) = psg.render_frame();
/// assert!(left.abs() <= 1.0 && right.abs() <= 1.0);
/// ```
#[derive(Clone)]
pub struct Psg {
    // Clock and timing
    internal_clock: u32,
    sample_rate: u32,
    ticks_per_sample: f64,
    tick_accumulator: f64,

    // Hardware registers
    registers: [u8; NUM_REGISTERS],

    // Generators
    tones: [ToneGenerator; NUM_CHANNELS],
    noise: NoiseGenerator,
    envelope: EnvelopeGenerator,

    // Mixer state (derived from R7; 0 bits mean enabled)
    tone_enabled: [bool; NUM_CHANNELS],
    noise_enabled: [bool; NUM_CHANNELS],

    // Per-channel output stage
    drum_override: [Option<f32>; NUM_CHANNELS],
    muted: [bool; NUM_CHANNELS],
    pan: [f32; NUM_CHANNELS],
    pan_gain: [(f32, f32); NUM_CHANNELS],
    master_volume: f32,

    // Observation hook
    levels: ChannelLevels,
}

impl Psg {
    /// Create a new PSG with default Atari ST clocks (2 MHz, 44.1 kHz).
    pub fn new() -> Self {
        Self::with_clocks(DEFAULT_MASTER_CLOCK, DEFAULT_SAMPLE_RATE)
    }

    /// Create a new PSG with custom clock frequencies.
    ///
    /// # Arguments
    ///
    /// * `master_clock` - master clock in Hz (divided by 8 internally)
    /// * `sample_rate` - audio output sample rate in Hz
    pub fn with_clocks(master_clock: u32, sample_rate: u32) -> Self {
        let internal_clock = (master_clock / 8).max(1);
        let sample_rate = sample_rate.max(1);
        let mut psg = Self {
            internal_clock,
            sample_rate,
            ticks_per_sample: internal_clock as f64 / sample_rate as f64,
            tick_accumulator: 0.0,
            registers: [0; NUM_REGISTERS],
            tones: [
                ToneGenerator::new(),
                ToneGenerator::new(),
                ToneGenerator::new(),
            ],
            noise: NoiseGenerator::new(),
            envelope: EnvelopeGenerator::new(),
            tone_enabled: [false; NUM_CHANNELS],
            noise_enabled: [false; NUM_CHANNELS],
            drum_override: [None; NUM_CHANNELS],
            muted: [false; NUM_CHANNELS],
            pan: [0.0; NUM_CHANNELS],
            pan_gain: [pan_gains(0.0); NUM_CHANNELS],
            master_volume: 1.0,
            levels: ChannelLevels::new(),
        };
        psg.reset();
        psg
    }

    /// Reset generators and registers to the post-construction state.
    ///
    /// The audio graph configuration (sample rate, pan, mute, master
    /// volume) is kept. Calling `reset` twice is equivalent to calling it
    /// once.
    pub fn reset(&mut self) {
        for tone in &mut self.tones {
            tone.reset();
        }
        self.noise.reset();
        self.envelope.reset();

        self.registers = [0; NUM_REGISTERS];
        // R7 = 0x3F: every tone and noise input disabled.
        self.apply_register(7, 0x3F);

        self.drum_override = [None; NUM_CHANNELS];
        self.tick_accumulator = 0.0;
    }

    /// Write to a register (0-15). Values are masked to the register's
    /// valid bits; out-of-range register numbers are ignored.
    pub fn write_register(&mut self, register: u8, value: u8) {
        self.apply_register(register as usize, value);
    }

    /// Read back a register value.
    pub fn read_register(&self, register: u8) -> u8 {
        let reg = register as usize;
        if reg < NUM_REGISTERS {
            self.registers[reg]
        } else {
            0
        }
    }

    /// Copy of the full register file.
    pub fn dump_registers(&self) -> [u8; NUM_REGISTERS] {
        self.registers
    }

    fn apply_register(&mut self, register: usize, value: u8) {
        if register >= NUM_REGISTERS {
            return;
        }

        let value = value & REG_MASK[register];
        self.registers[register] = value;

        match register {
            // Tone period registers (low/high pair per channel)
            0..=5 => {
                let channel = register / 2;
                let base = channel * 2;
                let period = ((self.registers[base + 1] as u32) << 8)
                    | self.registers[base] as u32;
                self.tones[channel].set_period(period);
            }

            6 => self.noise.set_period(value as u32),

            7 => {
                for channel in 0..NUM_CHANNELS {
                    self.tone_enabled[channel] = value & (1 << channel) == 0;
                    self.noise_enabled[channel] = value & (8 << channel) == 0;
                }
            }

            11 | 12 => {
                let period =
                    ((self.registers[12] as u32) << 8) | self.registers[11] as u32;
                self.envelope.set_period(period);
            }

            // Envelope shape: any write restarts the envelope. The 0xFF
            // "no write" frame sentinel is the caller's concern.
            13 => self.envelope.set_shape(value),

            // R8-R10 volumes are read at output time; R14/R15 carry
            // effect-slot data and do not touch the generators.
            _ => {}
        }
    }

    /// Restart the envelope without changing its shape (Sync Buzzer hook).
    #[inline]
    pub fn trigger_envelope(&mut self) {
        self.envelope.trigger();
    }

    /// Current envelope position in -64..=63 (debug/observation).
    #[inline]
    pub fn envelope_position(&self) -> i32 {
        self.envelope.position()
    }

    /// Replace a channel's DAC output with a sample level (DigiDrum hook).
    ///
    /// `None` restores normal mixer output.
    #[inline]
    pub fn set_drum_override(&mut self, channel: usize, level: Option<f32>) {
        if channel < NUM_CHANNELS {
            self.drum_override[channel] = level;
        }
    }

    /// Mute or unmute a channel.
    pub fn set_channel_mute(&mut self, channel: usize, mute: bool) {
        if channel < NUM_CHANNELS {
            self.muted[channel] = mute;
        }
    }

    /// Check whether a channel is muted.
    pub fn is_channel_muted(&self, channel: usize) -> bool {
        self.muted.get(channel).copied().unwrap_or(false)
    }

    /// Set a channel's stereo position, pan in [-1, +1] (clamped).
    pub fn set_channel_pan(&mut self, channel: usize, pan: f32) {
        if channel < NUM_CHANNELS {
            let pan = pan.clamp(-1.0, 1.0);
            self.pan[channel] = pan;
            self.pan_gain[channel] = pan_gains(pan);
        }
    }

    /// Current pan position of a channel.
    pub fn channel_pan(&self, channel: usize) -> f32 {
        self.pan.get(channel).copied().unwrap_or(0.0)
    }

    /// Set the master output volume, clamped to [0, 1].
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    /// Shared handle to the per-channel level observation buffer.
    pub fn channel_levels(&self) -> ChannelLevels {
        self.levels.clone()
    }

    /// Audio output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Internal clock in Hz (master clock / 8).
    pub fn internal_clock(&self) -> u32 {
        self.internal_clock
    }

    /// Render one stereo output frame.
    pub fn render_frame(&mut self) -> (f32, f32) {
        // Run the internal clock for this sample, OR-accumulating the
        // generator outputs.
        self.tick_accumulator += self.ticks_per_sample;
        let ticks = self.tick_accumulator as u32;
        self.tick_accumulator -= ticks as f64;

        let mut tone_acc = [false; NUM_CHANNELS];
        let mut noise_acc = false;
        for _ in 0..ticks {
            for (channel, tone) in self.tones.iter_mut().enumerate() {
                tone_acc[channel] |= tone.tick();
            }
            noise_acc |= self.noise.tick();
            self.envelope.tick();
        }
        if ticks == 0 {
            for (channel, tone) in self.tones.iter().enumerate() {
                tone_acc[channel] = tone.output();
            }
            noise_acc = self.noise.output();
        }

        let env_level = self.envelope.level() as usize;

        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for channel in 0..NUM_CHANNELS {
            let out = if self.muted[channel] {
                0.0
            } else if let Some(drum) = self.drum_override[channel] {
                drum
            } else {
                let gate = (tone_acc[channel] || !self.tone_enabled[channel])
                    && (noise_acc || !self.noise_enabled[channel]);
                if gate {
                    let vol_reg = self.registers[8 + channel];
                    let index = if vol_reg & 0x10 != 0 {
                        env_level
                    } else {
                        ((vol_reg & 0x0F) as usize) << 1
                    };
                    VOLUME_TABLE[index]
                } else {
                    0.0
                }
            };

            self.levels.store(channel, out);
            let (gain_l, gain_r) = self.pan_gain[channel];
            left += out * gain_l;
            right += out * gain_r;
        }

        let scale = self.master_volume / NUM_CHANNELS as f32;
        (left * scale, right * scale)
    }

    /// Render interleaved stereo frames into a buffer (length must be even).
    pub fn generate_frames_into(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = self.render_frame();
            frame[0] = left;
            frame[1] = right;
        }
    }
}

impl Default for Psg {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Psg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Psg")
            .field("registers", &self.registers)
            .field("sample_rate", &self.sample_rate)
            .field("internal_clock", &self.internal_clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_write_is_masked() {
        let mut psg = Psg::new();
        psg.write_register(1, 0xFF);
        assert_eq!(psg.read_register(1), 0x0F);
        psg.write_register(13, 0xFF);
        assert_eq!(psg.read_register(13), 0x0F);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut psg = Psg::new();
        psg.write_register(0, 0x55);
        psg.write_register(8, 0x0F);
        psg.write_register(13, 0x0A);

        psg.reset();
        let once = psg.dump_registers();
        psg.reset();
        assert_eq!(psg.dump_registers(), once);
        assert_eq!(psg.read_register(7), 0x3F);
        assert_eq!(psg.read_register(8), 0);
    }

    #[test]
    fn reset_reproduces_first_frames() {
        let mut psg = Psg::new();
        let program = |psg: &mut Psg| {
            psg.write_register(0, 0x40);
            psg.write_register(7, 0x3E);
            psg.write_register(8, 0x0F);
        };

        program(&mut psg);
        let first: Vec<(f32, f32)> = (0..64).map(|_| psg.render_frame()).collect();

        psg.reset();
        program(&mut psg);
        let second: Vec<(f32, f32)> = (0..64).map(|_| psg.render_frame()).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn silent_mixer_produces_silence() {
        let mut psg = Psg::new();
        // Defaults after reset: all disabled, volumes 0.
        for _ in 0..256 {
            let (l, r) = psg.render_frame();
            assert_eq!(l, 0.0);
            assert_eq!(r, 0.0);
        }
    }

    #[test]
    fn tone_period_one_gates_high_through_or_accumulation() {
        // A period-1 tone toggles at 125 kHz; over one 44.1 kHz sample the
        // OR accumulator must see at least one high edge, so with max
        // volume the channel emits continuously.
        let mut psg = Psg::new();
        psg.write_register(0, 0x01);
        psg.write_register(7, 0x3E);
        psg.write_register(8, 0x0F);

        for _ in 0..100 {
            let (l, r) = psg.render_frame();
            assert!(l > 0.0 && r > 0.0);
        }
    }

    #[test]
    fn output_magnitude_is_bounded() {
        let mut psg = Psg::new();
        // Everything on, everything loud.
        psg.write_register(7, 0x00);
        for reg in 8..11 {
            psg.write_register(reg, 0x0F);
        }
        psg.write_register(0, 0x01);
        psg.write_register(2, 0x02);
        psg.write_register(4, 0x03);

        for _ in 0..1000 {
            let (l, r) = psg.render_frame();
            assert!(l.abs() <= 1.0);
            assert!(r.abs() <= 1.0);
        }
    }

    #[test]
    fn envelope_shape_write_restarts_envelope() {
        let mut psg = Psg::new();
        psg.write_register(11, 0x10);
        psg.write_register(13, 0x0D); // attack-hold
        for _ in 0..2000 {
            psg.render_frame();
        }
        // Envelope has ramped up to hold level by now.
        psg.write_register(8, 0x1F); // envelope mode, channel A
        psg.write_register(7, 0x3E);
        psg.write_register(0, 0x01);
        let (loud, _) = psg.render_frame();
        assert!(loud > 0.2);

        // Rewriting R13 restarts from the quiet end of the attack ramp.
        psg.write_register(13, 0x0D);
        let (quiet, _) = psg.render_frame();
        assert!(quiet < loud);
    }

    #[test]
    fn drum_override_replaces_mixer_output() {
        let mut psg = Psg::new();
        psg.set_drum_override(0, Some(0.85));
        let (l, r) = psg.render_frame();
        assert!(l > 0.0 && r > 0.0);

        psg.set_drum_override(0, None);
        let (l2, _) = psg.render_frame();
        assert_eq!(l2, 0.0);
    }

    #[test]
    fn hard_panned_channel_is_silent_on_far_side() {
        let mut psg = Psg::new();
        psg.set_channel_pan(0, -1.0);
        psg.set_drum_override(0, Some(0.5));
        let (l, r) = psg.render_frame();
        assert!(l > 0.0);
        assert!(r.abs() < 1e-6);
    }

    #[test]
    fn center_pan_is_equal_power() {
        use approx::assert_relative_eq;

        let mut psg = Psg::new();
        psg.set_channel_pan(1, 0.0);
        psg.set_drum_override(1, Some(0.6));
        let (l, r) = psg.render_frame();
        assert_relative_eq!(l, r, epsilon = 1e-6);
        // cos(pi/4) on both sides.
        assert_relative_eq!(l, 0.6 * core::f32::consts::FRAC_1_SQRT_2 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn channel_levels_track_output() {
        let mut psg = Psg::new();
        let levels = psg.channel_levels();
        psg.set_drum_override(1, Some(0.5));
        psg.render_frame();
        let read = levels.load();
        assert_eq!(read[1], 0.5);
        assert_eq!(read[0], 0.0);
    }
}
