//! ProTracker 3 (PT3) module parsing and playback.
//!
//! PT3 is the dominant ZX Spectrum tracker format: 32 loopable samples, 16
//! ornaments, up to 85 patterns of three-channel bytecode, and an order
//! list. TurboSound files are two concatenated modules driving two PSG
//! chips.
//!
//! The [`Pt3Player`] turns pattern bytecode into one register image per
//! 50 Hz tick; the [`Pt3Replayer`] feeds those registers to one or two
//! [`ay3::Psg`] chips and renders audio.
//!
//! # Example
//!
//! ```no_run
//! use ay3_common::ChiptunePlayer;
//! use ay3_pt3_replayer::Pt3Replayer;
//!
//! let data = std::fs::read("song.pt3").unwrap();
//! let mut replayer = Pt3Replayer::load(&data, 44_100).unwrap();
//! replayer.play();
//! let mut buffer = vec![0.0f32; 2048];
//! replayer.generate_frames_into(&mut buffer);
//! ```

#![warn(missing_docs)]

mod format;
mod parser;
mod player;
pub mod tables;

#[doc(hidden)]
pub mod test_support;

pub use format::{Ornament, Pattern, Pt3Module, Sample, SampleLine};
pub use parser::parse_pt3;
pub use player::{Pt3Player, Pt3Registers, Pt3Replayer};

/// Error type for PT3 parsing and playback.
#[derive(thiserror::Error, Debug)]
pub enum Pt3Error {
    /// Structurally invalid file contents.
    #[error("malformed PT3 file: {0}")]
    MalformedFile(String),

    /// The file claims an implausible size.
    #[error("PT3 file too large: {0}")]
    TooLarge(String),

    /// Playback was requested without a successfully loaded file.
    #[error("no file loaded")]
    NoFileLoaded,
}

/// Result type for PT3 operations.
pub type Result<T> = std::result::Result<T, Pt3Error>;
