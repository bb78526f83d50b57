//! YM-file special effect engines.
//!
//! SID voice gating, DigiDrum sample playback and Sync Buzzer envelope
//! retriggering are not hardware features: they are playback techniques the
//! Atari ST scene drove from MFP timer interrupts. Here they run co-resident
//! with the PSG core and are ticked once per output sample, before the chip
//! renders that sample.
//!
//! All timer frequencies are capped at sample_rate / 4: files in the wild
//! occasionally encode nonsensical >10 kHz timer values and the cap keeps
//! them from aliasing.

use std::sync::Arc;

use crate::chip::Psg;
use crate::generators::NUM_CHANNELS;

/// Fixed-point fraction bits for DigiDrum playback positions.
const DRUM_PREC: u32 = 15;

/// DigiDrum output scale: 8-bit samples are mapped to [0, 0.85] so a loud
/// drum stays below the DAC's full-scale level.
const DRUM_GAIN: f32 = 0.85;

/// Gating waveforms for SID voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SidMode {
    /// Square gating: full volume while the phase MSB is set, else silence.
    Square,
    /// Sinusoidal gating: smooth amplitude modulation.
    Sinus,
}

/// Per-voice SID state.
#[derive(Debug, Clone)]
struct SidVoice {
    active: bool,
    /// 32-bit phase accumulator.
    pos: u32,
    /// Phase increment per output sample.
    step: u32,
    /// Gate volume (0-15).
    volume: u8,
    mode: SidMode,
}

impl Default for SidVoice {
    fn default() -> Self {
        Self {
            active: false,
            pos: 0,
            step: 0,
            volume: 0,
            mode: SidMode::Square,
        }
    }
}

/// Per-voice DigiDrum state.
#[derive(Debug, Clone, Default)]
struct DrumVoice {
    active: bool,
    /// 8-bit unsigned sample data, shared to keep restarts cheap.
    data: Option<Arc<[u8]>>,
    /// Fixed-point playback position (DRUM_PREC fraction bits).
    pos: u32,
    /// Fixed-point step per output sample.
    step: u32,
}

impl DrumVoice {
    fn current_level(&self) -> Option<f32> {
        let data = self.data.as_deref()?;
        let index = (self.pos >> DRUM_PREC) as usize;
        data.get(index)
            .map(|&byte| byte as f32 / 255.0 * DRUM_GAIN)
    }
}

/// The three effect engines, ticked once per output sample.
#[derive(Debug, Clone, Default)]
pub struct Effects {
    sample_rate: u32,

    // Sync Buzzer: 32-bit phase whose MSB transition retriggers the
    // envelope.
    buzzer_enabled: bool,
    buzzer_phase: u32,
    buzzer_step: u32,

    sid: [SidVoice; NUM_CHANNELS],
    drum: [DrumVoice; NUM_CHANNELS],
}

impl Effects {
    /// Create the effect engines for a given output sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            ..Default::default()
        }
    }

    /// Stop every effect and clear all phase state.
    pub fn reset(&mut self) {
        let sample_rate = self.sample_rate;
        *self = Self::new(sample_rate);
    }

    #[inline]
    fn capped(&self, freq: u32) -> u32 {
        freq.min(self.sample_rate / 4)
    }

    #[inline]
    fn phase_step(&self, freq: u32) -> u32 {
        (((self.capped(freq) as u64) << 31) / self.sample_rate as u64) as u32
    }

    // ------------------------------------------------------------------
    // Sync Buzzer
    // ------------------------------------------------------------------

    /// Start the Sync Buzzer at a timer frequency.
    pub fn sync_buzzer_start(&mut self, timer_freq: u32) {
        self.buzzer_step = self.phase_step(timer_freq);
        self.buzzer_phase = 0;
        self.buzzer_enabled = true;
    }

    /// Stop the Sync Buzzer.
    pub fn sync_buzzer_stop(&mut self) {
        self.buzzer_enabled = false;
        self.buzzer_phase = 0;
        self.buzzer_step = 0;
    }

    /// Whether the Sync Buzzer is currently running.
    pub fn sync_buzzer_enabled(&self) -> bool {
        self.buzzer_enabled
    }

    // ------------------------------------------------------------------
    // SID voices
    // ------------------------------------------------------------------

    /// Start square-wave SID gating on a voice.
    pub fn sid_start(&mut self, voice: usize, timer_freq: u32, volume: u8) {
        self.sid_start_mode(voice, timer_freq, volume, SidMode::Square);
    }

    /// Start sinusoidal SID gating on a voice.
    pub fn sid_sinus_start(&mut self, voice: usize, timer_freq: u32, volume: u8) {
        self.sid_start_mode(voice, timer_freq, volume, SidMode::Sinus);
    }

    fn sid_start_mode(&mut self, voice: usize, timer_freq: u32, volume: u8, mode: SidMode) {
        if voice >= NUM_CHANNELS {
            return;
        }
        let step = self.phase_step(timer_freq);
        let sid = &mut self.sid[voice];
        sid.volume = volume & 0x0F;
        sid.step = step;
        // Keep the phase of an already-running voice to avoid pops.
        if !sid.active {
            sid.pos = 0;
        }
        sid.mode = mode;
        sid.active = true;
    }

    /// Stop SID gating on a voice.
    pub fn sid_stop(&mut self, voice: usize) {
        if voice < NUM_CHANNELS {
            self.sid[voice] = SidVoice::default();
        }
    }

    /// Whether a SID voice is currently active.
    pub fn sid_active(&self, voice: usize) -> bool {
        self.sid.get(voice).map(|s| s.active).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // DigiDrums
    // ------------------------------------------------------------------

    /// Start DigiDrum playback on a voice. Playback always restarts from
    /// sample position 0 and runs to the end of the sample.
    pub fn digidrum_start(&mut self, voice: usize, sample: Arc<[u8]>, freq: u32) {
        if voice >= NUM_CHANNELS {
            return;
        }
        self.drum[voice] = DrumVoice {
            active: true,
            data: Some(sample),
            pos: 0,
            step: (((freq as u64) << DRUM_PREC) / self.sample_rate as u64) as u32,
        };
    }

    /// Stop DigiDrum playback on a voice.
    pub fn digidrum_stop(&mut self, voice: usize) {
        if voice < NUM_CHANNELS {
            self.drum[voice] = DrumVoice::default();
        }
    }

    /// Whether a DigiDrum is currently playing on a voice.
    pub fn digidrum_active(&self, voice: usize) -> bool {
        self.drum.get(voice).map(|d| d.active).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Per-sample tick
    // ------------------------------------------------------------------

    /// Advance all effects by one output sample and apply their state to
    /// the chip. Must be called before `Psg::render_frame` so the changes
    /// land in the same sample.
    pub fn tick(&mut self, psg: &mut Psg) {
        if self.buzzer_enabled {
            self.buzzer_phase = self.buzzer_phase.wrapping_add(self.buzzer_step);
            // MSB 0 -> 1 transition retriggers the hardware envelope.
            if self.buzzer_phase & 0x8000_0000 != 0 {
                psg.trigger_envelope();
                self.buzzer_phase &= 0x7FFF_FFFF;
            }
        }

        for voice in 0..NUM_CHANNELS {
            let sid = &mut self.sid[voice];
            if sid.active {
                let level = match sid.mode {
                    SidMode::Square => {
                        if sid.pos & 0x8000_0000 != 0 {
                            sid.volume
                        } else {
                            0
                        }
                    }
                    SidMode::Sinus => {
                        let phase = sid.pos as f32 / u32::MAX as f32
                            * core::f32::consts::TAU;
                        let shaped = 0.5 * (1.0 + phase.sin()) * sid.volume as f32;
                        shaped.round().clamp(0.0, 15.0) as u8
                    }
                };
                psg.write_register(8 + voice as u8, level);
                sid.pos = sid.pos.wrapping_add(sid.step);
            }
        }

        for voice in 0..NUM_CHANNELS {
            let drum = &mut self.drum[voice];
            if drum.active {
                match drum.current_level() {
                    Some(level) => {
                        psg.set_drum_override(voice, Some(level));
                        drum.pos = drum.pos.wrapping_add(drum.step);
                    }
                    None => {
                        // Ran past the end of the sample: hand the channel
                        // back to the mixer.
                        *drum = DrumVoice::default();
                        psg.set_drum_override(voice, None);
                    }
                }
            }
        }
    }
}
