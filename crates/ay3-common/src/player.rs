//! Unified chiptune player trait.
//!
//! Defines the common interface implemented by the YM and PT3 replayers.

use crate::MetadataFields;

/// Playback state for chiptune players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Player is stopped (at beginning or end).
    #[default]
    Stopped,
    /// Player is actively playing.
    Playing,
    /// Player is paused (can resume).
    Paused,
}

/// Unified player interface for chiptune formats.
///
/// This trait provides a common API for playing YM register streams and PT3
/// tracker modules. All players support basic playback control, frame-level
/// seeking and stereo sample generation.
///
/// # Sample Generation
///
/// Players generate interleaved stereo f32 frames in the range -1.0 to 1.0
/// (`buffer[2n]` = left, `buffer[2n + 1]` = right). The output sample rate is
/// typically 44100 Hz but may vary with the host audio subsystem.
///
/// # Frames
///
/// "Frame" here means one player update (one VBL for YM files, one tracker
/// tick for PT3), not one audio sample pair.
pub trait ChiptunePlayer {
    /// The metadata type for this player.
    type Metadata: MetadataFields;

    /// Start or resume playback.
    fn play(&mut self);

    /// Pause playback (keeps position, silences the chip).
    fn pause(&mut self);

    /// Stop playback and reset to the beginning.
    fn stop(&mut self);

    /// Get current playback state.
    fn state(&self) -> PlaybackState;

    /// Check if currently playing.
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Get song metadata.
    fn metadata(&self) -> &Self::Metadata;

    /// Current player frame (VBL frame or tracker tick).
    fn current_frame(&self) -> u32;

    /// Total number of player frames in the song.
    fn frame_count(&self) -> u32;

    /// Seek to a player frame.
    ///
    /// Out-of-range targets clamp to the last frame.
    fn seek(&mut self, frame: u32);

    /// Seek to a position expressed in seconds.
    fn seek_seconds(&mut self, seconds: f32) {
        let frame = (seconds * self.frame_rate() as f32).max(0.0) as u32;
        self.seek(frame);
    }

    /// Player update rate in Hz (50 for PAL material).
    fn frame_rate(&self) -> u32 {
        50
    }

    /// Set the master output volume, clamped to [0, 1].
    fn set_master_volume(&mut self, volume: f32);

    /// Set the stereo position of a channel, pan in [-1, +1].
    fn set_channel_pan(&mut self, channel: usize, pan: f32);

    /// Latest per-channel output magnitudes (observation hook, may tear).
    fn channel_levels(&self) -> [f32; 3];

    /// Generate interleaved stereo frames into an existing buffer.
    ///
    /// Fills the entire buffer. If playback is stopped or paused, the buffer
    /// is filled with silence (zeros). The buffer length must be even.
    fn generate_frames_into(&mut self, buffer: &mut [f32]);

    /// Generate interleaved stereo frames into a new buffer.
    fn generate_frames(&mut self, sample_pairs: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; sample_pairs * 2];
        self.generate_frames_into(&mut buffer);
        buffer
    }

    /// Get the output sample rate in Hz.
    fn sample_rate(&self) -> u32 {
        44_100
    }
}
