//! Common traits and types for AY/YM chiptune replayers.
//!
//! This crate provides the shared abstractions used by the format-specific
//! replayer crates (`ay3-ym-replayer`, `ay3-pt3-replayer`):
//!
//! - [`ChiptunePlayer`] - unified playback control and sample generation
//! - [`PlaybackObserver`] - state/frame/error callbacks
//! - [`MetadataFields`] - metadata access (title, author, duration, etc.)
//!
//! # Example
//!
//! ```ignore
//! use ay3_common::{ChiptunePlayer, PlaybackState};
//!
//! fn play_any_format<P: ChiptunePlayer>(player: &mut P) {
//!     player.play();
//!
//!     let mut buffer = vec![0.0; 2048];
//!     while player.state() == PlaybackState::Playing {
//!         player.generate_frames_into(&mut buffer);
//!         // ... send interleaved stereo frames to the audio device
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod metadata;
mod observer;
mod player;

pub use metadata::{BasicMetadata, MetadataFields};
pub use observer::PlaybackObserver;
pub use player::{ChiptunePlayer, PlaybackState};

// ============================================================================
// Common Constants
// ============================================================================

/// Standard audio sample rate (44.1 kHz CD quality).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// PAL frame rate (50 Hz) - used by Atari ST, ZX Spectrum and most European
/// systems.
pub const FRAME_RATE_PAL: u32 = 50;

/// Standard PSG master clock on the Atari ST (2 MHz).
pub const ATARI_PSG_CLOCK_HZ: u32 = 2_000_000;

/// PSG master clock on the ZX Spectrum 128 (1.7734 MHz).
pub const SPECTRUM_PSG_CLOCK_HZ: u32 = 1_773_400;

/// Atari ST MFP (MC68901) timer clock (2.4576 MHz).
///
/// Source of the timer frequencies that drive the YM-file special effects.
pub const ATARI_MFP_CLOCK_HZ: u32 = 2_457_600;

/// Number of audio channels per PSG chip.
pub const CHANNELS_PER_PSG: usize = 3;
