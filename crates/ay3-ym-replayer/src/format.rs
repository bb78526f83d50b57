//! Parsed YM file model.

use std::sync::Arc;

use ay3_common::MetadataFields;
use bitflags::bitflags;

/// YM container revisions handled by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YmFormat {
    /// YM2 (Mad Max register dumps).
    Ym2,
    /// YM3 without loop information.
    Ym3,
    /// YM3 with a trailing loop frame.
    Ym3b,
    /// YM5: full header, metadata, digidrums, SID/DigiDrum effects.
    Ym5,
    /// YM6: YM5 plus the extended two-slot effect encoding.
    Ym6,
}

impl YmFormat {
    /// Short format tag, e.g. "YM6".
    pub fn tag(&self) -> &'static str {
        match self {
            YmFormat::Ym2 => "YM2",
            YmFormat::Ym3 => "YM3",
            YmFormat::Ym3b => "YM3b",
            YmFormat::Ym5 => "YM5",
            YmFormat::Ym6 => "YM6",
        }
    }
}

impl std::fmt::Display for YmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

bitflags! {
    /// YM5/YM6 header attribute bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SongAttributes: u32 {
        /// Frame stream is stored register-major (all R0s, then all R1s, ...).
        const INTERLEAVED = 1;
        /// DigiDrum samples are signed (unused by this player).
        const DRUMS_SIGNED = 2;
        /// DigiDrum samples are 4-bit packed in the low nibble.
        const DRUMS_4BIT = 4;
    }
}

/// A fully parsed YM file: header fields, metadata, DigiDrum bank and the
/// register frame stream (one 16-byte image per frame).
#[derive(Debug, Clone)]
pub struct YmFile {
    /// Container revision.
    pub format: YmFormat,
    /// PSG master clock in Hz (2 MHz default for YM2/YM3).
    pub master_clock: u32,
    /// Player frame rate in Hz (50 default).
    pub frame_rate: u16,
    /// Frame to restart from after the last frame.
    pub loop_frame: u32,
    /// Header attributes with the storage-only bits already resolved
    /// (frames deinterleaved, drums expanded to 8 bits).
    pub attributes: SongAttributes,
    /// Song title.
    pub song_name: String,
    /// Composer.
    pub author: String,
    /// Free-text comment.
    pub comment: String,
    /// DigiDrum sample bank (8-bit unsigned).
    pub digidrums: Vec<Arc<[u8]>>,
    /// Register frames, 16 bytes each. YM2/YM3 frames carry zeros in
    /// R14/R15.
    pub frames: Vec<[u8; 16]>,
}

impl YmFile {
    /// Number of register frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Serialise back to an uncompressed YM5/YM6 byte stream.
    ///
    /// Frames are written sequentially (not interleaved) and drums as raw
    /// 8-bit samples, so the attribute bits for both storage variants are
    /// cleared. YM2/YM3 files serialise as YM5.
    pub fn to_bytes(&self) -> Vec<u8> {
        let magic: &[u8; 4] = match self.format {
            YmFormat::Ym6 => b"YM6!",
            _ => b"YM5!",
        };

        let mut out = Vec::with_capacity(64 + self.frames.len() * 16);
        out.extend_from_slice(magic);
        out.extend_from_slice(b"LeOnArD!");
        out.extend_from_slice(&(self.frames.len() as u32).to_be_bytes());
        let attributes = self.attributes
            & !(SongAttributes::INTERLEAVED | SongAttributes::DRUMS_4BIT);
        out.extend_from_slice(&attributes.bits().to_be_bytes());
        out.extend_from_slice(&(self.digidrums.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.master_clock.to_be_bytes());
        out.extend_from_slice(&self.frame_rate.to_be_bytes());
        out.extend_from_slice(&self.loop_frame.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // no extra data

        for drum in &self.digidrums {
            out.extend_from_slice(&(drum.len() as u32).to_be_bytes());
            out.extend_from_slice(drum);
        }

        for text in [&self.song_name, &self.author, &self.comment] {
            out.extend_from_slice(text.as_bytes());
            out.push(0);
        }

        for frame in &self.frames {
            out.extend_from_slice(frame);
        }

        out.extend_from_slice(b"End!");
        out
    }
}

impl MetadataFields for YmFile {
    fn title(&self) -> &str {
        &self.song_name
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn comments(&self) -> &str {
        &self.comment
    }

    fn format(&self) -> &str {
        self.format.tag()
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.frames.len())
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate as u32
    }

    fn loop_frame(&self) -> Option<usize> {
        Some(self.loop_frame as usize)
    }
}
