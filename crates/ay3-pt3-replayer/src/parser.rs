//! PT3 module parser.
//!
//! All multi-byte fields are little-endian. The fixed header layout:
//!
//! ```text
//! 0x00..0x63  ASCII header ("ProTracker 3.x compilation of ..." or
//!             "Vortex Tracker II 1.0 module: ..."), title at 0x1E (32
//!             bytes), author at 0x42 (32 bytes)
//! 0x63        tone table id (low 2 bits)
//! 0x64        initial delay (ticks per row)
//! 0x65        number of positions
//! 0x66        loop position
//! 0x67..0x69  pattern table pointer
//! 0x69..0xA9  32 sample pointers
//! 0xA9..0xC9  16 ornament pointers
//! 0xC9..      position list, terminated by 0xFF
//! ```
//!
//! TurboSound files are two modules back to back; the second is found by
//! scanning for another tracker signature from offset 256 on.

use log::{debug, warn};

use crate::format::{Ornament, Pattern, Pt3Module, Sample, SampleLine};
use crate::{Pt3Error, Result};

/// Smallest file that can hold the fixed header and a position list.
const MIN_FILE_SIZE: usize = 202;

/// Per-lane bytecode safety cap.
const MAX_LANE_BYTES: usize = 2048;

/// Parse a PT3 file, including TurboSound detection.
pub fn parse_pt3(data: &[u8]) -> Result<Pt3Module> {
    if let Some(split) = find_second_module(data) {
        debug!("TurboSound file: second module at offset {split}");
        let mut first = parse_single(&data[..split])?;
        match parse_single(&data[split..]) {
            Ok(second) => first.second_module = Some(Box::new(second)),
            Err(e) => warn!("ignoring malformed second TurboSound module: {e}"),
        }
        return Ok(first);
    }
    parse_single(data)
}

/// Locate a second tracker header signature at offset >= 256.
fn find_second_module(data: &[u8]) -> Option<usize> {
    const SIGNATURES: [&[u8]; 2] = [b"ProTr", b"Vortex"];
    let mut offset = 256;
    while offset + MIN_FILE_SIZE <= data.len() {
        for signature in SIGNATURES {
            if data[offset..].starts_with(signature) {
                return Some(offset);
            }
        }
        offset += 1;
    }
    None
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| Pt3Error::MalformedFile(format!("pointer at {offset:#x} out of range")))
}

fn header_text(data: &[u8], offset: usize, len: usize) -> String {
    let raw = &data[offset..offset + len];
    let text: String = raw
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { ' ' })
        .collect();
    text.trim().to_string()
}

fn parse_single(data: &[u8]) -> Result<Pt3Module> {
    if data.len() < MIN_FILE_SIZE {
        return Err(Pt3Error::MalformedFile(format!(
            "file of {} bytes is too small for a PT3 header",
            data.len()
        )));
    }

    // Version digit from "ProTracker 3.x" / "Vortex Tracker II"; files
    // written by other tools get the latest semantics.
    let version = match data[13] {
        digit @ b'0'..=b'9' => (digit - b'0').clamp(3, 6),
        _ => 6,
    };

    let title = header_text(data, 0x1E, 32);
    let author = header_text(data, 0x42, 32);

    let tone_table = data[0x63] & 0x03;
    let initial_delay = data[0x64].max(1);
    let position_count = data[0x65] as usize;
    let loop_position = data[0x66] as usize;
    let pattern_table = read_u16(data, 0x67)? as usize;

    // Position list: values until the 0xFF terminator, each a pattern
    // index times 3.
    let mut positions = Vec::new();
    let mut offset = 0xC9;
    loop {
        let byte = *data
            .get(offset)
            .ok_or_else(|| Pt3Error::MalformedFile("unterminated position list".into()))?;
        if byte == 0xFF {
            break;
        }
        positions.push(byte);
        offset += 1;
    }
    if positions.is_empty() {
        return Err(Pt3Error::MalformedFile("empty position list".into()));
    }
    if positions.len() != position_count {
        warn!(
            "position count field says {position_count}, list has {}",
            positions.len()
        );
    }
    let loop_position = if loop_position < positions.len() {
        loop_position
    } else {
        warn!("loop position {loop_position} out of range, looping to 0");
        0
    };

    let samples = parse_samples(data)?;
    let ornaments = parse_ornaments(data)?;

    // Patterns referenced by the position list, densely up to the highest
    // index. The on-disk pointer table cannot address more than 85
    // patterns (256 / 3).
    let pattern_count = positions.iter().map(|&p| p as usize / 3).max().unwrap_or(0) + 1;
    if pattern_count > 86 {
        return Err(Pt3Error::TooLarge(format!("{pattern_count} patterns")));
    }
    let mut patterns = Vec::with_capacity(pattern_count);
    for index in 0..pattern_count {
        patterns.push(parse_pattern(data, pattern_table, index)?);
    }

    debug!(
        "parsed PT3 v3.{version}: \"{title}\" by \"{author}\", {} positions, {} patterns",
        positions.len(),
        patterns.len()
    );

    Ok(Pt3Module {
        version,
        tone_table,
        initial_delay,
        loop_position,
        positions,
        samples,
        ornaments,
        patterns,
        title,
        author,
        second_module: None,
    })
}

fn parse_samples(data: &[u8]) -> Result<Vec<Sample>> {
    let mut samples = Vec::with_capacity(32);
    for slot in 0..32 {
        let pointer = read_u16(data, 0x69 + slot * 2)? as usize;
        if pointer == 0 || pointer + 2 > data.len() {
            samples.push(Sample::default());
            continue;
        }

        let loop_position = data[pointer] as usize;
        let length = data[pointer + 1] as usize;
        let body = pointer + 2;
        if body + length * 4 > data.len() {
            warn!("sample {slot} reaches past end of file, ignoring");
            samples.push(Sample::default());
            continue;
        }

        let lines = (0..length)
            .map(|i| {
                let at = body + i * 4;
                SampleLine::decode([data[at], data[at + 1], data[at + 2], data[at + 3]])
            })
            .collect();
        samples.push(Sample {
            loop_position: loop_position.min(length.saturating_sub(1)),
            lines,
        });
    }
    Ok(samples)
}

fn parse_ornaments(data: &[u8]) -> Result<Vec<Ornament>> {
    let mut ornaments = Vec::with_capacity(16);
    for slot in 0..16 {
        let pointer = read_u16(data, 0xA9 + slot * 2)? as usize;
        if pointer == 0 || pointer + 2 > data.len() {
            ornaments.push(Ornament::default());
            continue;
        }

        let loop_position = data[pointer] as usize;
        let length = data[pointer + 1] as usize;
        let body = pointer + 2;
        if body + length > data.len() {
            warn!("ornament {slot} reaches past end of file, ignoring");
            ornaments.push(Ornament::default());
            continue;
        }
        if loop_position > length {
            return Err(Pt3Error::MalformedFile(format!(
                "ornament {slot} loop {loop_position} past its length {length}"
            )));
        }

        ornaments.push(Ornament {
            loop_position: loop_position.min(length.saturating_sub(1)),
            offsets: data[body..body + length].iter().map(|&b| b as i8).collect(),
        });
    }
    Ok(ornaments)
}

fn parse_pattern(data: &[u8], table: usize, index: usize) -> Result<Pattern> {
    let mut lanes: [Vec<u8>; 3] = Default::default();
    for (lane, slot) in lanes.iter_mut().enumerate() {
        let pointer = read_u16(data, table + index * 6 + lane * 2)? as usize;
        if pointer == 0 || pointer >= data.len() {
            // A dead lane plays as an immediate end-of-track.
            continue;
        }
        let end = (pointer + MAX_LANE_BYTES).min(data.len());
        *slot = data[pointer..end].to_vec();
    }
    Ok(Pattern { lanes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ModuleBuilder;

    #[test]
    fn rejects_short_files() {
        assert!(matches!(
            parse_pt3(&[0u8; 64]),
            Err(Pt3Error::MalformedFile(_))
        ));
    }

    #[test]
    fn parses_minimal_module() {
        let data = ModuleBuilder::new()
            .title("Test Song")
            .author("Someone")
            .pattern([vec![0x50, 0xD0, 0x00], vec![0x00], vec![0x00]])
            .build();

        let module = parse_pt3(&data).unwrap();
        assert_eq!(module.title, "Test Song");
        assert_eq!(module.author, "Someone");
        assert_eq!(module.positions.len(), 1);
        assert_eq!(module.patterns.len(), 1);
        assert_eq!(module.patterns[0].lanes[0][0], 0x50);
        assert!(!module.is_turbo_sound());
    }

    #[test]
    fn position_values_address_existing_patterns() {
        let data = ModuleBuilder::new()
            .positions(vec![0, 3, 0])
            .pattern([vec![0x00], vec![0x00], vec![0x00]])
            .pattern([vec![0x00], vec![0x00], vec![0x00]])
            .build();

        let module = parse_pt3(&data).unwrap();
        assert_eq!(module.positions.len(), 3);
        for position in 0..module.positions.len() {
            assert!(module.pattern_at(position).unwrap() < module.patterns.len());
        }
    }

    #[test]
    fn parses_sample_lines() {
        let data = ModuleBuilder::new()
            .pattern([vec![0x00], vec![0x00], vec![0x00]])
            .sample(1, 0, vec![[0x00, 0x0F, 0x10, 0x00], [0x00, 0x08, 0x00, 0x00]])
            .build();

        let module = parse_pt3(&data).unwrap();
        let sample = &module.samples[1];
        assert_eq!(sample.lines.len(), 2);
        assert_eq!(sample.lines[0].amplitude, 15);
        assert_eq!(sample.lines[0].tone_offset, 0x10);
        assert_eq!(sample.lines[1].amplitude, 8);
    }

    #[test]
    fn ornament_loop_past_length_is_malformed() {
        let data = ModuleBuilder::new()
            .pattern([vec![0x00], vec![0x00], vec![0x00]])
            .raw_ornament(1, 5, vec![1, 2])
            .build();

        assert!(matches!(
            parse_pt3(&data),
            Err(Pt3Error::MalformedFile(_))
        ));
    }

    #[test]
    fn detects_turbo_sound_second_module() {
        let first = ModuleBuilder::new()
            .pattern([vec![0x50, 0xD0, 0x00], vec![0x00], vec![0x00]])
            .pad_to(2048)
            .build();
        let second = ModuleBuilder::new()
            .pattern([vec![0x51, 0xD0, 0x00], vec![0x00], vec![0x00]])
            .build();

        let mut data = first;
        data.extend_from_slice(&second);

        let module = parse_pt3(&data).unwrap();
        assert!(module.is_turbo_sound());
        let twin = module.second_module.as_ref().unwrap();
        assert_eq!(twin.patterns[0].lanes[0][0], 0x51);
    }
}
