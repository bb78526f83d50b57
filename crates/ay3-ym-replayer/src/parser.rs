//! YM file parser.
//!
//! Dispatches on the 4-byte magic and decodes the frame stream into
//! sequential 16-byte register images. All multi-byte header fields are
//! big-endian.

use std::sync::Arc;

use log::{debug, warn};

use ay3::tables::DIGIDRUM_4BIT;

use crate::format::{SongAttributes, YmFile, YmFormat};
use crate::{Result, YmError};

/// Upper bound on the frame count a file may claim.
const MAX_FRAMES: u32 = 100_000;

/// Default master clock for the headerless formats (Atari ST).
const DEFAULT_MASTER_CLOCK: u32 = ay3_common::ATARI_PSG_CLOCK_HZ;

/// Default frame rate for the headerless formats.
const DEFAULT_FRAME_RATE: u16 = ay3_common::FRAME_RATE_PAL as u16;

/// Parse an uncompressed YM file.
///
/// For LHA-packed data run [`crate::compression::decompress_if_needed`]
/// first (or use [`crate::YmPlayer::load`], which does).
pub fn parse_ym(data: &[u8]) -> Result<YmFile> {
    if data.len() < 4 {
        return Err(YmError::InvalidMagic);
    }

    let file = match &data[0..4] {
        b"YM2!" => parse_small(data, YmFormat::Ym2)?,
        b"YM3!" => parse_small(data, YmFormat::Ym3)?,
        b"YM3b" => parse_small(data, YmFormat::Ym3b)?,
        b"YM5!" => parse_full(data, YmFormat::Ym5)?,
        b"YM6!" => parse_full(data, YmFormat::Ym6)?,
        magic if magic.starts_with(b"YM") => {
            return Err(YmError::UnsupportedVersion(
                String::from_utf8_lossy(magic).into_owned(),
            ));
        }
        _ => return Err(YmError::InvalidMagic),
    };

    debug!(
        "parsed {} file: {} frames at {} Hz, loop {}",
        file.format,
        file.frames.len(),
        file.frame_rate,
        file.loop_frame
    );
    Ok(file)
}

fn read_be_u16(data: &[u8], offset: usize, what: &str) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| YmError::Truncated(what.to_string()))
}

fn read_be_u32(data: &[u8], offset: usize, what: &str) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| YmError::Truncated(what.to_string()))
}

fn read_c_string(data: &[u8], offset: &mut usize) -> Result<String> {
    let start = *offset;
    while *offset < data.len() && data[*offset] != 0 {
        *offset += 1;
    }
    if *offset >= data.len() {
        return Err(YmError::Truncated("unterminated metadata string".into()));
    }
    let text = String::from_utf8_lossy(&data[start..*offset]).into_owned();
    *offset += 1; // NUL
    Ok(text)
}

/// YM2/YM3/YM3b: magic, then 14 interleaved register columns, optionally a
/// trailing big-endian loop frame (YM3b).
fn parse_small(data: &[u8], format: YmFormat) -> Result<YmFile> {
    let has_loop = format == YmFormat::Ym3b;
    let trailer = if has_loop { 4 } else { 0 };

    if data.len() < 4 + 14 + trailer {
        return Err(YmError::Truncated(format!("{format} payload")));
    }

    let payload = &data[4..data.len() - trailer];
    if payload.len() % 14 != 0 {
        return Err(YmError::MalformedFile(format!(
            "{format} payload of {} bytes is not a multiple of 14",
            payload.len()
        )));
    }

    let frame_count = payload.len() / 14;
    if frame_count as u32 > MAX_FRAMES {
        return Err(YmError::TooLarge(format!("{frame_count} frames")));
    }

    let frames = deinterleave(payload, frame_count, 14);

    let loop_frame = if has_loop {
        let raw = read_be_u32(data, data.len() - 4, "YM3b loop frame")?;
        if raw as usize >= frame_count {
            warn!("YM3b loop frame {raw} out of range, looping to 0");
            0
        } else {
            raw
        }
    } else {
        0
    };

    Ok(YmFile {
        format,
        master_clock: DEFAULT_MASTER_CLOCK,
        frame_rate: DEFAULT_FRAME_RATE,
        loop_frame,
        attributes: SongAttributes::empty(),
        song_name: String::new(),
        author: String::new(),
        comment: String::new(),
        digidrums: Vec::new(),
        frames,
    })
}

/// YM5/YM6: "LeOnArD!" signature, 34-byte header, extra data, digidrum
/// bank, three NUL-terminated strings, frame data, optional "End!" marker.
fn parse_full(data: &[u8], format: YmFormat) -> Result<YmFile> {
    if data.len() < 34 {
        return Err(YmError::Truncated(format!("{format} header")));
    }
    if &data[4..12] != b"LeOnArD!" {
        return Err(YmError::MalformedFile(format!(
            "{format} check string missing"
        )));
    }

    let frame_count = read_be_u32(data, 12, "frame count")?;
    if frame_count > MAX_FRAMES {
        return Err(YmError::TooLarge(format!("{frame_count} frames")));
    }
    let raw_attributes = read_be_u32(data, 16, "attributes")?;
    let attributes = SongAttributes::from_bits_truncate(raw_attributes);
    let digidrum_count = read_be_u16(data, 20, "digidrum count")?;
    let master_clock = read_be_u32(data, 22, "master clock")?;
    let frame_rate = read_be_u16(data, 26, "frame rate")?;
    let loop_frame = read_be_u32(data, 28, "loop frame")?;
    let extra_size = read_be_u16(data, 32, "extra data size")?;

    let mut offset = 34usize;
    offset = offset
        .checked_add(extra_size as usize)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| YmError::Truncated("extra data".into()))?;

    // DigiDrum bank: 32-bit size + raw bytes each; 4-bit packed drums are
    // expanded through the DAC curve.
    let mut digidrums = Vec::with_capacity(digidrum_count as usize);
    for index in 0..digidrum_count {
        let size = read_be_u32(data, offset, "digidrum size")? as usize;
        offset += 4;
        let bytes = data
            .get(offset..offset + size)
            .ok_or_else(|| YmError::Truncated(format!("digidrum {index}")))?;
        offset += size;

        let sample: Arc<[u8]> = if attributes.contains(SongAttributes::DRUMS_4BIT) {
            bytes
                .iter()
                .map(|&b| DIGIDRUM_4BIT[(b & 0x0F) as usize])
                .collect()
        } else {
            Arc::from(bytes)
        };
        digidrums.push(sample);
    }

    let song_name = read_c_string(data, &mut offset)?;
    let author = read_c_string(data, &mut offset)?;
    let comment = read_c_string(data, &mut offset)?;

    let frame_bytes = (frame_count as usize)
        .checked_mul(16)
        .ok_or_else(|| YmError::TooLarge("frame stream".into()))?;
    let stream = data
        .get(offset..offset + frame_bytes)
        .ok_or_else(|| YmError::Truncated("frame data".into()))?;
    offset += frame_bytes;

    let frames = if attributes.contains(SongAttributes::INTERLEAVED) {
        deinterleave(stream, frame_count as usize, 16)
    } else {
        stream
            .chunks_exact(16)
            .map(|chunk| {
                let mut frame = [0u8; 16];
                frame.copy_from_slice(chunk);
                frame
            })
            .collect()
    };

    // Files in the wild sometimes omit the end marker.
    match data.get(offset..offset + 4) {
        Some(b"End!") => {}
        Some(other) => warn!(
            "unexpected trailer {:02X?} where \"End!\" was expected",
            other
        ),
        None => warn!("missing \"End!\" trailer"),
    }

    let loop_frame = if frame_count > 0 && loop_frame >= frame_count {
        warn!("loop frame {loop_frame} out of range, looping to 0");
        0
    } else {
        loop_frame
    };

    Ok(YmFile {
        format,
        master_clock,
        frame_rate: if frame_rate == 0 {
            DEFAULT_FRAME_RATE
        } else {
            frame_rate
        },
        loop_frame,
        attributes: attributes & !(SongAttributes::INTERLEAVED | SongAttributes::DRUMS_4BIT),
        song_name,
        author,
        comment,
        digidrums,
        frames,
    })
}

/// Convert a register-major stream (all R0s, then all R1s, ...) into
/// sequential 16-byte frames.
fn deinterleave(stream: &[u8], frame_count: usize, registers: usize) -> Vec<[u8; 16]> {
    let mut frames = vec![[0u8; 16]; frame_count];
    for reg in 0..registers {
        for (frame_index, frame) in frames.iter_mut().enumerate() {
            frame[reg] = stream[reg * frame_count + frame_index];
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_ym5(frame_count: u32, interleaved: bool) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"YM5!");
        data.extend_from_slice(b"LeOnArD!");
        data.extend_from_slice(&frame_count.to_be_bytes());
        data.extend_from_slice(&(interleaved as u32).to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes()); // drums
        data.extend_from_slice(&2_000_000u32.to_be_bytes());
        data.extend_from_slice(&50u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes()); // loop
        data.extend_from_slice(&0u16.to_be_bytes()); // extra
        data.extend_from_slice(b"Song\0Author\0Comment\0");
        data
    }

    #[test]
    fn rejects_unknown_magic() {
        assert!(matches!(parse_ym(b"MOD!data"), Err(YmError::InvalidMagic)));
        assert!(matches!(
            parse_ym(b"YM4!xxxxxxxx"),
            Err(YmError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn parses_minimal_ym3() {
        // 14 interleaved zero frames: silence throughout.
        let mut data = Vec::new();
        data.extend_from_slice(b"YM3!");
        data.extend_from_slice(&[0u8; 14 * 14]);

        let file = parse_ym(&data).unwrap();
        assert_eq!(file.format, YmFormat::Ym3);
        assert_eq!(file.frame_count(), 14);
        assert_eq!(file.master_clock, 2_000_000);
        assert_eq!(file.frame_rate, 50);
        for frame in &file.frames {
            assert_eq!(frame, &[0u8; 16]);
        }
    }

    #[test]
    fn ym3_deinterleaves_register_major_data() {
        let frame_count = 3;
        let mut data = Vec::new();
        data.extend_from_slice(b"YM3!");
        for reg in 0..14u8 {
            for frame in 0..frame_count as u8 {
                data.push((reg << 4) | frame);
            }
        }

        let file = parse_ym(&data).unwrap();
        for frame_index in 0..frame_count {
            for reg in 0..14 {
                assert_eq!(
                    file.frames[frame_index][reg],
                    ((reg as u8) << 4) | frame_index as u8
                );
            }
            assert_eq!(file.frames[frame_index][14], 0);
            assert_eq!(file.frames[frame_index][15], 0);
        }
    }

    #[test]
    fn ym3b_reads_trailing_loop_frame() {
        let mut data = Vec::new();
        data.extend_from_slice(b"YM3b");
        data.extend_from_slice(&[0u8; 5 * 14]);
        data.extend_from_slice(&3u32.to_be_bytes());

        let file = parse_ym(&data).unwrap();
        assert_eq!(file.format, YmFormat::Ym3b);
        assert_eq!(file.frame_count(), 5);
        assert_eq!(file.loop_frame, 3);
    }

    #[test]
    fn ym3_with_bad_size_is_malformed() {
        let mut data = Vec::new();
        data.extend_from_slice(b"YM3!");
        data.extend_from_slice(&[0u8; 15]);
        assert!(matches!(parse_ym(&data), Err(YmError::MalformedFile(_))));
    }

    #[test]
    fn ym5_requires_check_string() {
        let mut data = minimal_ym5(1, false);
        data[5] = b'x';
        data.extend_from_slice(&[0u8; 16]);
        assert!(matches!(parse_ym(&data), Err(YmError::MalformedFile(_))));
    }

    #[test]
    fn ym5_sequential_frames() {
        let mut data = minimal_ym5(2, false);
        for value in 0..32u8 {
            data.push(value);
        }
        data.extend_from_slice(b"End!");

        let file = parse_ym(&data).unwrap();
        assert_eq!(file.frame_count(), 2);
        assert_eq!(file.frames[0][0], 0);
        assert_eq!(file.frames[1][0], 16);
        assert_eq!(file.frames[1][15], 31);
    }

    #[test]
    fn ym5_interleaved_frames() {
        let mut data = minimal_ym5(2, true);
        for reg in 0..16u8 {
            for frame in 0..2u8 {
                data.push(reg * 2 + frame);
            }
        }
        data.extend_from_slice(b"End!");

        let file = parse_ym(&data).unwrap();
        assert_eq!(file.frames[0][0], 0);
        assert_eq!(file.frames[1][0], 1);
        assert_eq!(file.frames[0][1], 2);
        assert_eq!(file.frames[1][1], 3);
        assert!(!file.attributes.contains(SongAttributes::INTERLEAVED));
    }

    #[test]
    fn ym6_expands_4bit_digidrums() {
        let mut data = Vec::new();
        data.extend_from_slice(b"YM6!");
        data.extend_from_slice(b"LeOnArD!");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&4u32.to_be_bytes()); // DRUMS_4BIT
        data.extend_from_slice(&1u16.to_be_bytes()); // one drum
        data.extend_from_slice(&2_000_000u32.to_be_bytes());
        data.extend_from_slice(&50u16.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&4u32.to_be_bytes()); // drum size
        data.extend_from_slice(&[0x00, 0x03, 0x07, 0x0F]);
        data.extend_from_slice(b"\0\0\0");
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(b"End!");

        let file = parse_ym(&data).unwrap();
        assert_eq!(file.digidrums.len(), 1);
        assert_eq!(&file.digidrums[0][..], &[0, 2, 12, 255]);
    }

    #[test]
    fn missing_end_marker_is_tolerated() {
        let mut data = minimal_ym5(1, false);
        data.extend_from_slice(&[0u8; 16]);
        assert!(parse_ym(&data).is_ok());
    }

    #[test]
    fn oversized_frame_count_is_rejected() {
        let mut data = minimal_ym5(200_000, false);
        data.extend_from_slice(&[0u8; 16]);
        assert!(matches!(parse_ym(&data), Err(YmError::TooLarge(_))));
    }

    #[test]
    fn truncated_frame_data_is_rejected() {
        let mut data = minimal_ym5(4, false);
        data.extend_from_slice(&[0u8; 16]); // only one of four frames
        assert!(matches!(parse_ym(&data), Err(YmError::Truncated(_))));
    }

    #[test]
    fn serialised_file_reparses_identically() {
        let mut data = minimal_ym5(2, true);
        for reg in 0..16u8 {
            for frame in 0..2u8 {
                data.push(reg ^ frame);
            }
        }
        data.extend_from_slice(b"End!");

        let first = parse_ym(&data).unwrap();
        let second = parse_ym(&first.to_bytes()).unwrap();
        assert_eq!(first.frames, second.frames);
        assert_eq!(first.song_name, second.song_name);
        assert_eq!(first.loop_frame, second.loop_frame);
    }
}
