//! Synthetic module builder for tests.
//!
//! Assembles a structurally valid PT3 byte image from patterns, samples
//! and ornaments, so parser and player tests do not need binary fixtures.

use crate::format::Pt3Module;
use crate::parser::parse_pt3;

/// Builder for in-memory PT3 files.
#[derive(Default)]
pub struct ModuleBuilder {
    title: String,
    author: String,
    tone_table: u8,
    delay: u8,
    positions: Option<Vec<u8>>,
    loop_position: u8,
    patterns: Vec<[Vec<u8>; 3]>,
    samples: Vec<(usize, u8, Vec<[u8; 4]>)>,
    ornaments: Vec<(usize, u8, Vec<i8>)>,
    pad_to: usize,
}

impl ModuleBuilder {
    /// Start a builder with a 3.6 header and a delay of 3.
    pub fn new() -> Self {
        Self {
            delay: 3,
            tone_table: 2,
            ..Default::default()
        }
    }

    /// Set the song title.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Set the author.
    pub fn author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    /// Set ticks per row.
    pub fn delay(mut self, delay: u8) -> Self {
        self.delay = delay;
        self
    }

    /// Set the tone table id.
    pub fn tone_table(mut self, table: u8) -> Self {
        self.tone_table = table;
        self
    }

    /// Set the raw position list (pattern indices times 3). Defaults to a
    /// single position playing pattern 0.
    pub fn positions(mut self, positions: Vec<u8>) -> Self {
        self.positions = Some(positions);
        self
    }

    /// Set the loop position.
    pub fn loop_position(mut self, position: u8) -> Self {
        self.loop_position = position;
        self
    }

    /// Append a pattern (three bytecode lanes).
    pub fn pattern(mut self, lanes: [Vec<u8>; 3]) -> Self {
        self.patterns.push(lanes);
        self
    }

    /// Define a sample slot from raw 4-byte lines.
    pub fn sample(mut self, slot: usize, loop_position: u8, lines: Vec<[u8; 4]>) -> Self {
        self.samples.push((slot, loop_position, lines));
        self
    }

    /// Define an ornament slot.
    pub fn ornament(mut self, slot: usize, loop_position: u8, offsets: Vec<i8>) -> Self {
        self.ornaments.push((slot, loop_position, offsets));
        self
    }

    /// Define an ornament with an arbitrary loop byte (for malformed-file
    /// tests).
    pub fn raw_ornament(mut self, slot: usize, loop_byte: u8, offsets: Vec<i8>) -> Self {
        self.ornaments.push((slot, loop_byte, offsets));
        self
    }

    /// Zero-pad the image to at least `len` bytes (TurboSound layouts).
    pub fn pad_to(mut self, len: usize) -> Self {
        self.pad_to = len;
        self
    }

    /// Assemble the byte image.
    pub fn build(self) -> Vec<u8> {
        let positions = self.positions.unwrap_or_else(|| vec![0]);

        let mut data = vec![0u8; 0xC9];
        data[..14].copy_from_slice(b"ProTracker 3.6");

        let title = self.title.as_bytes();
        data[0x1E..0x1E + title.len().min(32)].copy_from_slice(&title[..title.len().min(32)]);
        let author = self.author.as_bytes();
        data[0x42..0x42 + author.len().min(32)]
            .copy_from_slice(&author[..author.len().min(32)]);

        data[0x63] = self.tone_table;
        data[0x64] = self.delay;
        data[0x65] = positions.len() as u8;
        data[0x66] = self.loop_position;

        data.extend_from_slice(&positions);
        data.push(0xFF);

        // Pattern table, back-filled after the lane data is placed.
        let pattern_table = data.len();
        data.resize(pattern_table + self.patterns.len() * 6, 0);
        data[0x67..0x69].copy_from_slice(&(pattern_table as u16).to_le_bytes());

        let mut lane_pointers = Vec::new();
        for lanes in &self.patterns {
            let mut pointers = [0u16; 3];
            for (lane, bytes) in lanes.iter().enumerate() {
                pointers[lane] = data.len() as u16;
                data.extend_from_slice(bytes);
            }
            lane_pointers.push(pointers);
        }
        for (index, pointers) in lane_pointers.iter().enumerate() {
            for (lane, pointer) in pointers.iter().enumerate() {
                let at = pattern_table + index * 6 + lane * 2;
                data[at..at + 2].copy_from_slice(&pointer.to_le_bytes());
            }
        }

        for (slot, loop_position, lines) in &self.samples {
            let pointer = data.len() as u16;
            let at = 0x69 + slot * 2;
            data[at..at + 2].copy_from_slice(&pointer.to_le_bytes());
            data.push(*loop_position);
            data.push(lines.len() as u8);
            for line in lines {
                data.extend_from_slice(line);
            }
        }

        for (slot, loop_position, offsets) in &self.ornaments {
            let pointer = data.len() as u16;
            let at = 0xA9 + slot * 2;
            data[at..at + 2].copy_from_slice(&pointer.to_le_bytes());
            data.push(*loop_position);
            data.push(offsets.len() as u8);
            data.extend(offsets.iter().map(|&o| o as u8));
        }

        if data.len() < self.pad_to {
            data.resize(self.pad_to, 0);
        }
        data
    }

    /// Assemble and parse, panicking on parser errors.
    pub fn build_module(self) -> Pt3Module {
        parse_pt3(&self.build()).expect("builder produced an unparseable module")
    }
}
