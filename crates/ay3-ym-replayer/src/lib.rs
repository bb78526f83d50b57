//! YM chiptune file parsing and playback.
//!
//! Supports the Atari ST register-dump formats:
//! - **YM2!** / **YM3!** - bare interleaved 14-register frame streams
//! - **YM3b** - YM3 with a trailing loop frame
//! - **YM5!** / **YM6!** - full header, metadata, DigiDrum samples and
//!   MFP-timer special effects (SID voice, DigiDrum, Sync Buzzer)
//!
//! Files may be LHA-compressed (most are); decompression is transparent.
//!
//! # Example
//!
//! ```no_run
//! use ay3_common::ChiptunePlayer;
//! use ay3_ym_replayer::YmPlayer;
//!
//! let data = std::fs::read("song.ym").unwrap();
//! let mut player = YmPlayer::load(&data, 44_100).unwrap();
//! player.play();
//! let mut buffer = vec![0.0f32; 2048];
//! player.generate_frames_into(&mut buffer);
//! ```

#![warn(missing_docs)]

pub mod compression;
mod effects;
mod format;
mod parser;
mod player;

pub use effects::{decode_effects_ym5, decode_effects_ym6, EffectCommand, MFP_CLOCK};
pub use format::{SongAttributes, YmFile, YmFormat};
pub use parser::parse_ym;
pub use player::YmPlayer;

/// Error type for YM parsing and playback.
#[derive(thiserror::Error, Debug)]
pub enum YmError {
    /// The file does not start with a known YM magic.
    #[error("invalid magic: not a YM file")]
    InvalidMagic,

    /// Structurally invalid file contents.
    #[error("malformed YM file: {0}")]
    MalformedFile(String),

    /// A field or section reaches past the end of the file.
    #[error("truncated YM file: {0}")]
    Truncated(String),

    /// The file claims an implausible size.
    #[error("YM file too large: {0}")]
    TooLarge(String),

    /// Recognized container, unsupported revision.
    #[error("unsupported YM version: {0}")]
    UnsupportedVersion(String),

    /// LHA decompression failed.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Playback was requested without a successfully loaded file.
    #[error("no file loaded")]
    NoFileLoaded,
}

/// Result type for YM operations.
pub type Result<T> = std::result::Result<T, YmError>;
