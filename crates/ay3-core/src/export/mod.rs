//! Offline audio export.

mod wav;

pub use wav::write_wav_stereo;
