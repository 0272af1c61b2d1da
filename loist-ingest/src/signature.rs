//! Format classification from file-head magic bytes.
//!
//! Mirrors the teacher's extension-trusting approach nowhere: every upload
//! is classified from content, and a claimed extension that disagrees with
//! the classified format is rejected rather than silently corrected.

use loist_common::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
    M4a,
    Aac,
    Ogg,
    Wav,
}

impl AudioFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Flac => "FLAC",
            AudioFormat::M4a => "M4A",
            AudioFormat::Aac => "AAC",
            AudioFormat::Ogg => "OGG",
            AudioFormat::Wav => "WAV",
        }
    }

    /// Extensions a caller-supplied filename may carry for this format.
    fn matches_extension(self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            AudioFormat::Mp3 => ext == "mp3",
            AudioFormat::Flac => ext == "flac",
            AudioFormat::M4a => ext == "m4a" || ext == "mp4",
            AudioFormat::Aac => ext == "aac",
            AudioFormat::Ogg => ext == "ogg" || ext == "oga",
            AudioFormat::Wav => ext == "wav",
        }
    }
}

/// Classify a format from the first bytes of a file, per the
/// `(offset, magic, format)` table: rejects when no tuple matches or when
/// a supplied extension disagrees with the classification.
pub fn classify(head: &[u8], claimed_extension: Option<&str>) -> Result<AudioFormat> {
    if head.len() < 12 {
        return Err(Error::terminal(
            ErrorKind::FormatInvalid,
            "file too short to classify (need at least 12 bytes)",
        ));
    }

    let format = if head.starts_with(b"ID3") {
        Some(AudioFormat::Mp3)
    } else if head[0] == 0xff && matches!(head[1], 0xfb | 0xf3 | 0xf2) {
        Some(AudioFormat::Mp3)
    } else if head[0] == 0xff && matches!(head[1], 0xf1 | 0xf9) {
        Some(AudioFormat::Aac)
    } else if head.starts_with(b"fLaC") {
        Some(AudioFormat::Flac)
    } else if &head[4..8] == b"ftyp" {
        Some(AudioFormat::M4a)
    } else if head.starts_with(b"OggS") {
        Some(AudioFormat::Ogg)
    } else if head.starts_with(b"RIFF") && &head[8..12] == b"WAVE" {
        Some(AudioFormat::Wav)
    } else {
        None
    };

    let format = format.ok_or_else(|| {
        Error::terminal(ErrorKind::FormatInvalid, "no known magic-byte signature matched")
    })?;

    if let Some(ext) = claimed_extension {
        if !ext.is_empty() && !format.matches_extension(ext) {
            return Err(Error::terminal(
                ErrorKind::FormatInvalid,
                format!(
                    "claimed extension '{ext}' disagrees with classified format {}",
                    format.as_str()
                ),
            ));
        }
    }

    Ok(format)
}
