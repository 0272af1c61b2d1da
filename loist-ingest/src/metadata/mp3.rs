//! MP3 (ID3v1/v2.3/v2.4) metadata extraction.
//!
//! Tags and embedded artwork go through the `id3` crate directly (its
//! `TagLike` accessors and `PictureType` are a closer fit for the
//! front-cover-preference rule than a generic tag abstraction); the
//! technical quintuple (duration/channels/sample rate/bitrate/bit depth)
//! comes from `lofty`, the same crate every other format in this module
//! uses for it.

use std::path::Path;

use id3::TagLike;
use loist_common::Result;

use super::{leading_year, Artwork, Extracted, TrackMetadata};

pub fn extract(path: &Path) -> Result<Extracted> {
    let tag = id3::Tag::read_from_path(path).unwrap_or_default();

    let year = tag
        .date_recorded()
        .map(|d| d.year)
        .or_else(|| tag.year())
        .or_else(|| {
            tag.get("TYER")
                .and_then(|f| f.content().text())
                .and_then(leading_year)
        });

    let technical = super::extract_via_lofty(path).map(|e| e.metadata).unwrap_or_default();

    let metadata = TrackMetadata {
        artist: tag.artist().map(str::to_string),
        title: tag.title().map(str::to_string),
        album: tag.album().map(str::to_string),
        genre: tag.genre().map(str::to_string),
        year,
        ..technical
    };

    let pictures: Vec<&id3::frame::Picture> = tag.pictures().collect();
    let artwork = pictures
        .iter()
        .find(|p| p.picture_type == id3::frame::PictureType::CoverFront)
        .or_else(|| pictures.first())
        .and_then(|p| super::sniff_artwork_kind(&p.data).map(|kind| Artwork { kind, bytes: p.data.clone() }));

    Ok(Extracted { metadata, artwork })
}
