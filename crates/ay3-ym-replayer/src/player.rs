//! YM register-stream replayer.
//!
//! Each player frame writes one 16-byte register image to the PSG, decodes
//! the frame's effect slots, and starts or stops the SID / DigiDrum / Sync
//! Buzzer engines accordingly. Frame pacing is carried as a fractional
//! sample budget so non-integer sample-rate/frame-rate ratios do not drift.

use ay3::{Effects, Psg};
use ay3_common::{ChiptunePlayer, PlaybackObserver, PlaybackState};
use log::debug;

use crate::compression::decompress_if_needed;
use crate::effects::{decode_effects_ym5, decode_effects_ym6, EffectCommand};
use crate::format::{YmFile, YmFormat};
use crate::parser::parse_ym;
use crate::Result;

/// YM file player driving a single PSG.
pub struct YmPlayer {
    file: YmFile,
    psg: Psg,
    effects: Effects,
    state: PlaybackState,
    sample_rate: u32,

    current_frame: usize,
    /// Samples still to render before the next frame boundary.
    samples_left_in_frame: u32,
    /// Fractional sample carry between frames.
    frame_remainder: f64,
    samples_per_frame: f64,

    // Effect bookkeeping across frames
    sid_active: [bool; 3],
    drum_playing: [Option<(u8, u32)>; 3],

    observer: Option<Box<dyn PlaybackObserver>>,
}

impl YmPlayer {
    /// Parse (and, if necessary, decompress) YM data and build a player
    /// rendering at `sample_rate`.
    pub fn load(data: &[u8], sample_rate: u32) -> Result<Self> {
        let raw = decompress_if_needed(data)?;
        let file = parse_ym(&raw)?;
        Ok(Self::from_file(file, sample_rate))
    }

    /// Build a player from an already parsed file.
    pub fn from_file(file: YmFile, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let frame_rate = file.frame_rate.max(1) as f64;
        debug!(
            "YM player: {} \"{}\" by \"{}\", {} frames",
            file.format,
            file.song_name,
            file.author,
            file.frame_count()
        );
        Self {
            psg: Psg::with_clocks(file.master_clock, sample_rate),
            effects: Effects::new(sample_rate),
            state: PlaybackState::Stopped,
            sample_rate,
            current_frame: 0,
            samples_left_in_frame: 0,
            frame_remainder: 0.0,
            samples_per_frame: sample_rate as f64 / frame_rate,
            sid_active: [false; 3],
            drum_playing: [None; 3],
            observer: None,
            file,
        }
    }

    /// Install an observer for state/frame callbacks.
    pub fn set_observer(&mut self, observer: Box<dyn PlaybackObserver>) {
        self.observer = Some(observer);
    }

    /// The parsed file driving this player.
    pub fn file(&self) -> &YmFile {
        &self.file
    }

    /// Direct access to the PSG (tests, visualisation).
    pub fn psg(&self) -> &Psg {
        &self.psg
    }

    /// Mutable access to the PSG.
    pub fn psg_mut(&mut self) -> &mut Psg {
        &mut self.psg
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            if let Some(observer) = self.observer.as_mut() {
                observer.on_state_change(state);
            }
        }
    }

    fn reset_playback(&mut self) {
        self.psg.reset();
        self.effects.reset();
        self.current_frame = 0;
        self.samples_left_in_frame = 0;
        self.frame_remainder = 0.0;
        self.sid_active = [false; 3];
        self.drum_playing = [None; 3];
    }

    /// Apply one register frame to the chip and run the effect decoder.
    fn apply_frame(&mut self, frame: [u8; 16]) {
        for reg in 0u8..16 {
            if reg == 13 {
                // 0xFF suppresses the envelope shape write (and with it
                // the restart); any other value retriggers.
                if frame[13] != 0xFF {
                    self.psg.write_register(13, frame[13]);
                }
            } else {
                self.psg.write_register(reg, frame[reg as usize]);
            }
        }

        let commands = match self.file.format {
            YmFormat::Ym5 => decode_effects_ym5(&frame),
            YmFormat::Ym6 => decode_effects_ym6(&frame),
            _ => [None, None],
        };
        self.apply_effect_commands(&commands);
    }

    fn apply_effect_commands(&mut self, commands: &[Option<EffectCommand>; 2]) {
        let mut sid_request: [Option<(u32, u8, bool)>; 3] = [None; 3];
        let mut drum_request: [Option<(u8, u32)>; 3] = [None; 3];
        let mut buzzer_request: Option<(u32, u8)> = None;

        for command in commands.iter().flatten() {
            match *command {
                EffectCommand::Sid {
                    voice,
                    freq,
                    volume,
                } => sid_request[voice as usize] = Some((freq, volume, false)),
                EffectCommand::SinusSid {
                    voice,
                    freq,
                    volume,
                } => sid_request[voice as usize] = Some((freq, volume, true)),
                EffectCommand::DigiDrum { voice, index, freq } => {
                    drum_request[voice as usize] = Some((index, freq));
                }
                EffectCommand::SyncBuzzer { freq, env_shape } => {
                    buzzer_request = Some((freq, env_shape));
                }
            }
        }

        // Sync Buzzer: starts on first request, stops the frame it is no
        // longer requested. The shape comes from the effect decoder (R13
        // low nibble) even when the frame suppressed the register write.
        match buzzer_request {
            Some((freq, env_shape)) => {
                if !self.effects.sync_buzzer_enabled() {
                    self.psg.write_register(13, env_shape);
                    self.effects.sync_buzzer_start(freq);
                }
            }
            None => {
                if self.effects.sync_buzzer_enabled() {
                    self.effects.sync_buzzer_stop();
                }
            }
        }

        for voice in 0..3 {
            // DigiDrum plays to completion regardless of later frames; a
            // changed request restarts from sample position 0.
            if let Some((index, freq)) = drum_request[voice] {
                let restart = self.drum_playing[voice] != Some((index, freq))
                    || !self.effects.digidrum_active(voice);
                if restart {
                    if let Some(sample) = self.file.digidrums.get(index as usize) {
                        self.effects.digidrum_start(voice, sample.clone(), freq);
                        self.drum_playing[voice] = Some((index, freq));
                    }
                }
            } else {
                self.drum_playing[voice] = None;
            }

            match sid_request[voice] {
                Some((freq, volume, sinus)) => {
                    if sinus {
                        self.effects.sid_sinus_start(voice, freq, volume);
                    } else {
                        self.effects.sid_start(voice, freq, volume);
                    }
                    self.sid_active[voice] = true;
                }
                None => {
                    if self.sid_active[voice] {
                        self.effects.sid_stop(voice);
                        self.sid_active[voice] = false;
                    }
                }
            }
        }
    }

    /// Move to the next frame boundary: apply registers and compute the
    /// sample budget for the frame.
    fn begin_frame(&mut self) {
        if self.file.frames.is_empty() {
            self.samples_left_in_frame = u32::MAX;
            return;
        }

        let frame = self.file.frames[self.current_frame];
        self.apply_frame(frame);

        let budget = self.samples_per_frame + self.frame_remainder;
        let samples = budget as u32;
        self.frame_remainder = budget - samples as f64;
        self.samples_left_in_frame = samples.max(1);

        if let Some(observer) = self.observer.as_mut() {
            observer.on_frame_change(self.current_frame as u32, self.file.frame_count() as u32);
        }
    }

    fn advance_frame(&mut self) {
        if self.current_frame + 1 >= self.file.frames.len() {
            self.current_frame =
                (self.file.loop_frame as usize).min(self.file.frames.len().saturating_sub(1));
        } else {
            self.current_frame += 1;
        }
    }

    /// Render one stereo sample pair.
    pub fn render_frame_pair(&mut self) -> (f32, f32) {
        if self.state != PlaybackState::Playing || self.file.frames.is_empty() {
            return (0.0, 0.0);
        }

        if self.samples_left_in_frame == 0 {
            self.begin_frame();
        }

        self.effects.tick(&mut self.psg);
        let out = self.psg.render_frame();

        self.samples_left_in_frame -= 1;
        if self.samples_left_in_frame == 0 {
            self.advance_frame();
        }
        out
    }
}

impl ChiptunePlayer for YmPlayer {
    type Metadata = YmFile;

    fn play(&mut self) {
        self.set_state(PlaybackState::Playing);
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            // Leave chip state intact but silence the DAC.
            for reg in 8..11 {
                self.psg.write_register(reg, 0);
            }
            self.set_state(PlaybackState::Paused);
        }
    }

    fn stop(&mut self) {
        self.reset_playback();
        self.set_state(PlaybackState::Stopped);
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn metadata(&self) -> &YmFile {
        &self.file
    }

    fn current_frame(&self) -> u32 {
        self.current_frame as u32
    }

    fn frame_count(&self) -> u32 {
        self.file.frame_count() as u32
    }

    fn seek(&mut self, frame: u32) {
        let target = (frame as usize).min(self.file.frame_count().saturating_sub(1));
        self.current_frame = target;
        self.samples_left_in_frame = 0;
        self.frame_remainder = 0.0;
        // Stale effects must not carry across a jump.
        self.effects.reset();
        for voice in 0..3 {
            self.psg.set_drum_override(voice, None);
        }
        self.sid_active = [false; 3];
        self.drum_playing = [None; 3];
    }

    fn frame_rate(&self) -> u32 {
        self.file.frame_rate as u32
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.psg.set_master_volume(volume);
    }

    fn set_channel_pan(&mut self, channel: usize, pan: f32) {
        self.psg.set_channel_pan(channel, pan);
    }

    fn channel_levels(&self) -> [f32; 3] {
        self.psg.channel_levels().load()
    }

    fn generate_frames_into(&mut self, buffer: &mut [f32]) {
        for pair in buffer.chunks_exact_mut(2) {
            let (left, right) = self.render_frame_pair();
            pair[0] = left;
            pair[1] = right;
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
