//! FLAC and OGG Vorbis metadata extraction, via `lofty`.

use std::path::Path;

use loist_common::Result;

use super::Extracted;

pub fn extract_flac(path: &Path) -> Result<Extracted> {
    super::extract_via_lofty(path)
}

pub fn extract_ogg(path: &Path) -> Result<Extracted> {
    super::extract_via_lofty(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ArtworkKind;
    use loist_common::ErrorKind;

    fn vorbis_comment_block(vendor: &str, comments: &[(&str, &str)]) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        block.extend_from_slice(vendor.as_bytes());
        block.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for (key, value) in comments {
            let entry = format!("{key}={value}");
            block.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            block.extend_from_slice(entry.as_bytes());
        }
        block
    }

    fn picture_block(mime: &str, picture_type: u32, data: &[u8]) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&picture_type.to_be_bytes());
        block.extend_from_slice(&(mime.len() as u32).to_be_bytes());
        block.extend_from_slice(mime.as_bytes());
        block.extend_from_slice(&0u32.to_be_bytes()); // description length
        block.extend_from_slice(&0u32.to_be_bytes()); // width
        block.extend_from_slice(&0u32.to_be_bytes()); // height
        block.extend_from_slice(&0u32.to_be_bytes()); // color depth
        block.extend_from_slice(&0u32.to_be_bytes()); // indexed colors
        block.extend_from_slice(&(data.len() as u32).to_be_bytes());
        block.extend_from_slice(data);
        block
    }

    fn metadata_block(block_type: u8, is_last: bool, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let header = block_type | if is_last { 0x80 } else { 0 };
        out.push(header);
        let size = body.len() as u32;
        out.push(((size >> 16) & 0xff) as u8);
        out.push(((size >> 8) & 0xff) as u8);
        out.push((size & 0xff) as u8);
        out.extend_from_slice(body);
        out
    }

    /// A conformant 34-byte STREAMINFO body: 2+2+3+3 bytes of block-size /
    /// frame-size bounds, the packed sample-rate/channels/bits-per-sample/
    /// total-samples octet run, then a 16-byte MD5 signature.
    fn streaminfo_body(sample_rate: u32, channels: u32, bits_per_sample: u32, total_samples: u64) -> Vec<u8> {
        let mut body = vec![0u8; 34];
        body[0] = 0x10;
        body[1] = 0x00; // min block size 4096
        body[2] = 0x10;
        body[3] = 0x00; // max block size 4096
        let ch_minus1 = channels - 1;
        let bps_minus1 = bits_per_sample - 1;
        body[10] = ((sample_rate >> 12) & 0xff) as u8;
        body[11] = ((sample_rate >> 4) & 0xff) as u8;
        body[12] = (((sample_rate & 0xf) << 4) | ((ch_minus1 & 0x7) << 1) | ((bps_minus1 >> 4) & 0x1)) as u8;
        body[13] = (((bps_minus1 & 0xf) << 4) | (((total_samples >> 32) & 0xf) as u32)) as u8;
        body[14] = ((total_samples >> 24) & 0xff) as u8;
        body[15] = ((total_samples >> 16) & 0xff) as u8;
        body[16] = ((total_samples >> 8) & 0xff) as u8;
        body[17] = (total_samples & 0xff) as u8;
        body
    }

    fn build_flac(with_picture: bool) -> Vec<u8> {
        let mut file = b"fLaC".to_vec();
        file.extend(metadata_block(0, false, &streaminfo_body(44100, 2, 16, 44100)));
        let comments = vorbis_comment_block(
            "loist-test",
            &[
                ("ARTIST", "Test Artist"),
                ("TITLE", "Test Title"),
                ("ALBUM", "Test Album"),
                ("GENRE", "Rock"),
                ("DATE", "2007-03-14"),
            ],
        );
        file.extend(metadata_block(4, !with_picture, &comments));
        if with_picture {
            // Picture type 3 = front cover, per the FLAC PICTURE block spec.
            let jpeg = picture_block("image/jpeg", 3, &[0xff, 0xd8, 0xff, 0xe0]);
            file.extend(metadata_block(6, true, &jpeg));
        }
        file
    }

    fn write_temp(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.flac", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extracts_flac_technical_fields_and_comments() {
        let path = write_temp("loist-flac-test", &build_flac(false));
        let extracted = extract_flac(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(extracted.metadata.channels, 2);
        assert_eq!(extracted.metadata.sample_rate_hz, 44100);
        assert_eq!(extracted.metadata.bit_depth, Some(16));
        assert!((extracted.metadata.duration_seconds - 1.0).abs() < 0.01);
        assert_eq!(extracted.metadata.artist.as_deref(), Some("Test Artist"));
        assert_eq!(extracted.metadata.title.as_deref(), Some("Test Title"));
        assert_eq!(extracted.metadata.album.as_deref(), Some("Test Album"));
        assert_eq!(extracted.metadata.genre.as_deref(), Some("Rock"));
        assert_eq!(extracted.metadata.year, Some(2007));
        assert!(extracted.artwork.is_none());
    }

    #[test]
    fn extracts_flac_embedded_picture() {
        let path = write_temp("loist-flac-pic-test", &build_flac(true));
        let extracted = extract_flac(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let artwork = extracted.artwork.expect("picture block should be parsed");
        assert_eq!(artwork.kind, ArtworkKind::Jpeg);
    }

    #[test]
    fn rejects_non_flac_stream() {
        let path = write_temp("loist-flac-bad", b"definitely not flac");
        let err = extract_flac(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.kind, ErrorKind::MetadataExtractionFailed);
    }

    // OGG Vorbis happy-path decoding runs through the same
    // `extract_via_lofty` path exercised above; a byte-valid Ogg/Vorbis
    // stream needs three codec header packets (identification, comment,
    // setup) plus correct per-page CRC-32 framing, which isn't something
    // worth hand-assembling here. The reject path needs no such fixture.
    #[test]
    fn rejects_non_ogg_stream() {
        let path = write_temp("loist-ogg-bad", b"definitely not an ogg stream");
        let err = extract_ogg(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.kind, ErrorKind::MetadataExtractionFailed);
    }
}
