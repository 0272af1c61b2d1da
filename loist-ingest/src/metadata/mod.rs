//! Format-dispatched metadata extraction (component B).

pub mod flac_ogg;
pub mod mp3;
pub mod mp4;
pub mod wav;

use std::path::Path;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::prelude::*;
use lofty::probe::Probe;

use loist_common::{Error, ErrorKind, Result};

use crate::signature::AudioFormat;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub duration_seconds: f64,
    pub channels: u16,
    pub sample_rate_hz: u32,
    pub bitrate_kbps: u32,
    pub bit_depth: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkKind {
    Jpeg,
    Png,
}

impl ArtworkKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtworkKind::Jpeg => "image/jpeg",
            ArtworkKind::Png => "image/png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artwork {
    pub kind: ArtworkKind,
    pub bytes: Vec<u8>,
}

/// Sniff a JPEG/PNG signature from raw artwork bytes, supplementing formats
/// whose embedded artwork carries no reliable content-type of its own
/// (FLAC/OGG PICTURE blocks, MP4 `covr` atoms).
pub fn sniff_artwork_kind(bytes: &[u8]) -> Option<ArtworkKind> {
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some(ArtworkKind::Jpeg)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        Some(ArtworkKind::Png)
    } else {
        None
    }
}

pub struct Extracted {
    pub metadata: TrackMetadata,
    pub artwork: Option<Artwork>,
}

/// Shared `lofty`-backed extraction path for every format except MP3,
/// whose ID3 frame handling (APIC picture-type preference, TDRC/TYER year
/// fallback) is specific enough to go through the `id3` crate directly
/// (`mp3.rs`). `lofty::probe::Probe` auto-detects the container (FLAC,
/// Ogg Vorbis, MP4/M4A/AAC, WAV) and `FileProperties` supplies the
/// technical quintuple uniformly across all of them.
pub(crate) fn extract_via_lofty(path: &Path) -> Result<Extracted> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::terminal(ErrorKind::MetadataExtractionFailed, format!("probe failed: {e}")))?
        .read()
        .map_err(|e| Error::terminal(ErrorKind::MetadataExtractionFailed, format!("read failed: {e}")))?;

    let properties = tagged_file.properties();
    let duration_seconds = properties.duration().as_secs_f64();
    let channels = properties.channels().unwrap_or(0) as u16;
    let sample_rate_hz = properties.sample_rate().unwrap_or(0);
    // `audio_bitrate()` is reported in bps; convert to the kbps this
    // struct's field carries everywhere else.
    let bitrate_kbps = properties.audio_bitrate().map(|bps| bps / 1000).unwrap_or(0);
    let bit_depth = properties.bit_depth().map(|bits| bits as u16);

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let (artist, title, album, genre, year) = match tag {
        Some(tag) => (
            tag.artist().map(|s| s.to_string()),
            tag.title().map(|s| s.to_string()),
            tag.album().map(|s| s.to_string()),
            tag.genre().map(|s| s.to_string()),
            tag.year().map(|y| y as i32),
        ),
        None => (None, None, None, None, None),
    };

    let artwork = tag.and_then(|tag| pick_front_cover_lofty(tag.pictures()));

    Ok(Extracted {
        metadata: TrackMetadata {
            artist,
            title,
            album,
            genre,
            year,
            duration_seconds,
            channels,
            sample_rate_hz,
            bitrate_kbps,
            bit_depth,
        },
        artwork,
    })
}

/// Picture-type front-cover preference, else the first picture
/// (`spec.md` §4.B), applied to `lofty`'s embedded-picture list.
fn pick_front_cover_lofty(pictures: &[lofty::picture::Picture]) -> Option<Artwork> {
    let picture = pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())?;
    let bytes = picture.data().to_vec();
    sniff_artwork_kind(&bytes).map(|kind| Artwork { kind, bytes })
}

/// Fraction of {artist, title, album, genre, year} present, used only for
/// optional warnings, never to reject extraction.
pub fn quality_score(metadata: &TrackMetadata) -> f64 {
    let present = [
        metadata.artist.is_some(),
        metadata.title.is_some(),
        metadata.album.is_some(),
        metadata.genre.is_some(),
        metadata.year.is_some(),
    ]
    .iter()
    .filter(|p| **p)
    .count();
    present as f64 / 5.0
}

/// `extract(path) → TrackMetadata | artwork-blob?`, dispatched on validated
/// format. Title defaults to the source filename stem when absent.
pub fn extract(path: &Path, format: AudioFormat, filename_stem: &str) -> Result<Extracted> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match format {
        AudioFormat::Mp3 => mp3::extract(path),
        AudioFormat::Flac => flac_ogg::extract_flac(path),
        AudioFormat::Ogg => flac_ogg::extract_ogg(path),
        AudioFormat::M4a | AudioFormat::Aac => mp4::extract(path),
        AudioFormat::Wav => wav::extract(path),
    }));

    let mut extracted = match result {
        Ok(inner) => inner.map_err(|e| {
            Error::terminal(ErrorKind::MetadataExtractionFailed, e.message)
        })?,
        Err(_) => {
            return Err(Error::terminal(
                ErrorKind::MetadataExtractionFailed,
                "metadata extraction panicked while decoding the file",
            ))
        }
    };

    if extracted.metadata.title.is_none() {
        extracted.metadata.title = Some(filename_stem.to_string());
    }

    if quality_score(&extracted.metadata) < 0.4 {
        tracing::warn!(
            filename_stem,
            quality_score = quality_score(&extracted.metadata),
            "low-metadata ingest"
        );
    }

    Ok(extracted)
}

/// Leading 4-digit run of a date-like string, e.g. Vorbis `date` comments
/// such as `"2007-03-14"` or bare `"2007"`.
pub fn leading_year(date: &str) -> Option<i32> {
    let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits[..4].parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_counts_present_fields() {
        let mut m = TrackMetadata::default();
        assert_eq!(quality_score(&m), 0.0);
        m.artist = Some("a".into());
        m.title = Some("b".into());
        assert_eq!(quality_score(&m), 0.4);
    }

    #[test]
    fn leading_year_parses_full_date() {
        assert_eq!(leading_year("2007-03-14"), Some(2007));
        assert_eq!(leading_year("2007"), Some(2007));
        assert_eq!(leading_year("07"), None);
        assert_eq!(leading_year("unknown"), None);
    }

    #[test]
    fn sniffs_jpeg_and_png() {
        assert_eq!(sniff_artwork_kind(&[0xff, 0xd8, 0xff, 0xe0]), Some(ArtworkKind::Jpeg));
        assert_eq!(
            sniff_artwork_kind(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]),
            Some(ArtworkKind::Png)
        );
        assert_eq!(sniff_artwork_kind(&[0, 1, 2, 3]), None);
    }
}
