//! Unified playback metadata trait.
//!
//! Provides a common interface for song metadata across the YM and PT3
//! file formats.

/// Unified metadata access for chiptune playback.
pub trait MetadataFields {
    /// Get the song title.
    fn title(&self) -> &str;

    /// Get the author/composer name.
    fn author(&self) -> &str;

    /// Get additional comments or description.
    ///
    /// Returns an empty string if no comments are available.
    fn comments(&self) -> &str {
        ""
    }

    /// Get the file format identifier.
    ///
    /// Examples: "YM6", "PT3".
    fn format(&self) -> &str;

    /// Get the total frame count, if known.
    fn frame_count(&self) -> Option<usize> {
        None
    }

    /// Get the playback frame rate in Hz.
    fn frame_rate(&self) -> u32 {
        50
    }

    /// Get the song duration in seconds, if known.
    fn duration_seconds(&self) -> Option<f32> {
        self.frame_count()
            .map(|fc| fc as f32 / self.frame_rate() as f32)
    }

    /// Get the loop start frame, if the song loops.
    fn loop_frame(&self) -> Option<usize> {
        None
    }
}

/// Basic metadata container implementing [`MetadataFields`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicMetadata {
    /// Song title.
    pub title: String,
    /// Author/composer name.
    pub author: String,
    /// Additional comments.
    pub comments: String,
    /// File format identifier (e.g., "YM6", "PT3").
    pub format: String,
    /// Total frame count.
    pub frame_count: Option<usize>,
    /// Playback frame rate in Hz.
    pub frame_rate: u32,
    /// Loop start frame.
    pub loop_frame: Option<usize>,
}

impl MetadataFields for BasicMetadata {
    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn comments(&self) -> &str {
        &self.comments
    }

    fn format(&self) -> &str {
        &self.format
    }

    fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn loop_frame(&self) -> Option<usize> {
        self.loop_frame
    }
}

impl BasicMetadata {
    /// Create a new `BasicMetadata` with default values.
    pub fn new() -> Self {
        Self {
            frame_rate: 50,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_derives_from_frames_and_rate() {
        let meta = BasicMetadata {
            frame_count: Some(3000),
            frame_rate: 50,
            ..BasicMetadata::new()
        };
        assert_eq!(meta.duration_seconds(), Some(60.0));
    }

    #[test]
    fn duration_unknown_without_frame_count() {
        assert_eq!(BasicMetadata::new().duration_seconds(), None);
    }
}
