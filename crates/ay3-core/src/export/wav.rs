//! WAV file export.

use std::path::Path;

use crate::Result;

/// Write interleaved stereo f32 frames to a 16-bit PCM WAV file.
///
/// Samples are clamped to [-1, 1] before conversion.
pub fn write_wav_stereo(path: impl AsRef<Path>, sample_rate: u32, frames: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| format!("failed to create WAV file: {e}"))?;

    for &sample in frames {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| format!("failed to write WAV sample: {e}"))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("failed to finalize WAV file: {e}"))?;
    Ok(())
}
