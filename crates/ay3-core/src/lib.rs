//! AY-3-8910 / YM2149 PSG emulator.
//!
//! A sample-accurate emulator of the General Instrument AY-3-8910 and
//! Yamaha YM2149 Programmable Sound Generators, with the special-effect
//! engines the Atari ST chiptune scene layered on top of the chip (SID
//! voice gating, DigiDrum PCM playback, Sync Buzzer envelope retrigger).
//!
//! # Features
//! - Three tone channels, 17-bit LFSR noise, 10-waveform hardware envelope
//! - Internal clock emulation at master_clock / 8 with exact long-run
//!   timing (fractional tick carry)
//! - Per-channel equal-power panning, stereo float output
//! - Multi-chip [`PsgBank`] for TurboSound playback
//! - Cross-thread register write queue and tear-tolerant channel level
//!   observation
//!
//! # Quick start
//! ```
//! use ay3::Psg;
//!
//! let mut psg = Psg::new();
//! psg.write_register(0, 0x1C); // Tone A period low
//! psg.write_register(1, 0x01); // Tone A period high
//! psg.write_register(7, 0x3E); // Mixer: tone A enabled
//! psg.write_register(8, 0x0F); // Volume A
//! let (left, right) = psg.render_frame();
//! # let _ = (left, right);
//! ```
//!
//! For YM file playback use the `ay3-ym-replayer` crate; for PT3 tracker
//! modules use `ay3-pt3-replayer`.

#![warn(missing_docs)]

mod chip;
mod effects;
mod generators;
mod levels;
mod psg_bank;
mod queue;
pub mod tables;

#[cfg(feature = "export-wav")]
pub mod export;

#[cfg(feature = "streaming")]
pub mod streaming;

/// Error type for PSG core operations.
///
/// File format errors live in the replayer crates; this enum only covers
/// the chip core and its audio output path.
#[derive(thiserror::Error, Debug)]
pub enum PsgError {
    /// IO error from filesystem or device.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The host audio subsystem could not be opened.
    #[error("audio output unavailable: {0}")]
    AudioUnavailable(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl From<String> for PsgError {
    fn from(msg: String) -> Self {
        PsgError::Other(msg)
    }
}

impl From<&str> for PsgError {
    fn from(msg: &str) -> Self {
        PsgError::Other(msg.to_string())
    }
}

/// Result type for PSG core operations.
pub type Result<T> = std::result::Result<T, PsgError>;

pub use chip::{Psg, NUM_REGISTERS};
pub use effects::Effects;
pub use generators::NUM_CHANNELS;
pub use levels::ChannelLevels;
pub use psg_bank::PsgBank;
pub use queue::{RegisterQueue, RegisterWrite};
