//! File sniffing and player construction.

use ay3_common::{ChiptunePlayer, MetadataFields};
use ay3_pt3_replayer::Pt3Replayer;
use ay3_ym_replayer::{compression, YmPlayer};

/// A loaded player of either supported format.
///
/// Both variants implement [`ChiptunePlayer`]; this enum gives the CLI one
/// concrete type to drive.
pub enum LoadedPlayer {
    /// YM register stream.
    Ym(YmPlayer),
    /// PT3 tracker module (possibly TurboSound).
    Pt3(Pt3Replayer),
}

impl LoadedPlayer {
    /// One-line description for the console.
    pub fn describe(&self) -> String {
        match self {
            LoadedPlayer::Ym(player) => {
                let file = player.file();
                format!(
                    "{} | \"{}\" by \"{}\" | {} frames @ {} Hz",
                    file.format(),
                    file.title(),
                    file.author(),
                    player.frame_count(),
                    player.frame_rate()
                )
            }
            LoadedPlayer::Pt3(player) => {
                let meta = player.metadata();
                format!(
                    "{} | \"{}\" by \"{}\" | {} ticks @ 50 Hz",
                    meta.format(),
                    meta.title(),
                    meta.author(),
                    player.frame_count()
                )
            }
        }
    }

    /// Start playback.
    pub fn play(&mut self) {
        match self {
            LoadedPlayer::Ym(p) => p.play(),
            LoadedPlayer::Pt3(p) => p.play(),
        }
    }

    /// Player frames in one pass of the song.
    pub fn frame_count(&self) -> u32 {
        match self {
            LoadedPlayer::Ym(p) => p.frame_count(),
            LoadedPlayer::Pt3(p) => p.frame_count(),
        }
    }

    /// Player update rate in Hz.
    pub fn frame_rate(&self) -> u32 {
        match self {
            LoadedPlayer::Ym(p) => p.frame_rate(),
            LoadedPlayer::Pt3(p) => p.frame_rate(),
        }
    }

    /// Set the master volume.
    pub fn set_master_volume(&mut self, volume: f32) {
        match self {
            LoadedPlayer::Ym(p) => p.set_master_volume(volume),
            LoadedPlayer::Pt3(p) => p.set_master_volume(volume),
        }
    }

    /// Render interleaved stereo frames.
    pub fn generate_frames_into(&mut self, buffer: &mut [f32]) {
        match self {
            LoadedPlayer::Ym(p) => p.generate_frames_into(buffer),
            LoadedPlayer::Pt3(p) => p.generate_frames_into(buffer),
        }
    }
}

/// Sniff the file content and build the matching player.
pub fn create_player(data: &[u8], sample_rate: u32) -> Result<LoadedPlayer, String> {
    if data.starts_with(b"YM") || compression::is_lha_compressed(data) {
        return YmPlayer::load(data, sample_rate)
            .map(LoadedPlayer::Ym)
            .map_err(|e| e.to_string());
    }

    if data.len() > 13 && (data.starts_with(b"ProTr") || data.starts_with(b"Vortex")) {
        return Pt3Replayer::load(data, sample_rate)
            .map(LoadedPlayer::Pt3)
            .map_err(|e| e.to_string());
    }

    Err("unrecognized file format (expected YM or PT3)".to_string())
}
