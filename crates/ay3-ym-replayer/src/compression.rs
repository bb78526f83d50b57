//! Transparent LHA/LZH decompression.
//!
//! Most YM files in the wild are LHA archives (typically LH5). This module
//! detects the `-lh?-` method signature and inflates the first archive
//! member in memory; uncompressed data passes through unchanged.

use std::io::Read;

use log::debug;

use crate::{Result, YmError};

/// The LHA method signature `-lh?-` can sit at several offsets depending
/// on the header level; searching the first bytes covers all variants.
const LHA_SEARCH_LIMIT: usize = 40;

/// Decompressed size cap. YM files are tens of kilobytes to a megabyte;
/// anything past this is a corrupt file or a decompression bomb.
const MAX_DECOMPRESSED_SIZE: u64 = 64 * 1024 * 1024;

/// Whether the data carries an LHA method signature.
pub fn is_lha_compressed(data: &[u8]) -> bool {
    let limit = LHA_SEARCH_LIMIT.min(data.len().saturating_sub(5));
    for i in 1..=limit {
        let window = &data[i..i + 5];
        if window[0] == b'-'
            && window[1] == b'l'
            && window[2] == b'h'
            && window[3].is_ascii_digit()
            && window[3] <= b'7'
            && window[4] == b'-'
        {
            return true;
        }
    }
    false
}

/// Decompress LHA data if compressed, otherwise return a copy unchanged.
pub fn decompress_if_needed(data: &[u8]) -> Result<Vec<u8>> {
    if !is_lha_compressed(data) {
        return Ok(data.to_vec());
    }

    let reader = delharc::LhaDecodeReader::new(data)
        .map_err(|e| YmError::Decompression(format!("bad LHA archive: {e}")))?;

    let mut decompressed = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE)
        .read_to_end(&mut decompressed)
        .map_err(|e| YmError::Decompression(format!("LHA decode failed: {e}")))?;

    if decompressed.len() as u64 >= MAX_DECOMPRESSED_SIZE {
        return Err(YmError::Decompression(
            "decompressed data exceeds the safety limit".into(),
        ));
    }

    debug!(
        "inflated LHA archive: {} -> {} bytes",
        data.len(),
        decompressed.len()
    );
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_lha_signature() {
        assert!(is_lha_compressed(b"\x20\x2d\x6c\x68\x35\x2d\x15"));
        assert!(!is_lha_compressed(b"YM6!LeOnArD!"));
        assert!(!is_lha_compressed(b""));
    }

    #[test]
    fn rejects_invalid_method_levels() {
        // Level 8 does not exist.
        assert!(!is_lha_compressed(b"\x20\x2d\x6c\x68\x38\x2d\x15"));
        // Missing trailing dash.
        assert!(!is_lha_compressed(b"\x20\x2d\x6c\x68\x35\x00\x15"));
    }

    #[test]
    fn does_not_match_signature_in_metadata_text() {
        let mut data = b"YM6!LeOnArD!".to_vec();
        data.extend_from_slice(b"Title: Song-lh edition");
        assert!(!is_lha_compressed(&data));
    }

    #[test]
    fn uncompressed_data_passes_through() {
        let data = b"YM3!\x00\x01\x02";
        assert_eq!(decompress_if_needed(data).unwrap(), data);
    }

    #[test]
    fn garbage_after_signature_fails_cleanly() {
        let data = b"\x20\x2d\x6c\x68\x35\x2d\x15GARBAGE";
        assert!(matches!(
            decompress_if_needed(data),
            Err(YmError::Decompression(_))
        ));
    }
}
