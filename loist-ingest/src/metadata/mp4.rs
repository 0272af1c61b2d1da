//! M4A/AAC (MP4 container) metadata extraction, via `lofty`.

use std::path::Path;

use loist_common::Result;

use super::Extracted;

pub fn extract(path: &Path) -> Result<Extracted> {
    super::extract_via_lofty(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ArtworkKind;
    use loist_common::ErrorKind;

    fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((8 + body.len()) as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    fn data_atom(payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0, 0, 0, 1, 0, 0, 0, 0]; // type indicator (UTF-8), locale
        body.extend_from_slice(payload);
        atom(b"data", &body)
    }

    fn item_atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        atom(kind, &data_atom(payload))
    }

    fn mvhd_body(timescale: u32, duration: u32) -> Vec<u8> {
        let mut body = vec![0u8; 20];
        body[12..16].copy_from_slice(&timescale.to_be_bytes());
        body[16..20].copy_from_slice(&duration.to_be_bytes());
        body
    }

    fn stsd_body(channels: u16, sample_rate: u32) -> Vec<u8> {
        let mut entry_body = Vec::new();
        entry_body.extend_from_slice(&[0u8; 6]); // reserved
        entry_body.extend_from_slice(&1u16.to_be_bytes()); // data reference index
        entry_body.extend_from_slice(&[0u8; 2]); // version
        entry_body.extend_from_slice(&[0u8; 2]); // revision
        entry_body.extend_from_slice(&[0u8; 4]); // vendor
        entry_body.extend_from_slice(&channels.to_be_bytes());
        entry_body.extend_from_slice(&16u16.to_be_bytes()); // sample size
        entry_body.extend_from_slice(&[0u8; 2]); // compression id
        entry_body.extend_from_slice(&[0u8; 2]); // packet size
        entry_body.extend_from_slice(&(sample_rate << 16).to_be_bytes());
        let entry = atom(b"mp4a", &entry_body);

        let mut body = vec![0u8; 4]; // version/flags
        body.extend_from_slice(&1u32.to_be_bytes()); // entry count
        body.extend(entry);
        body
    }

    fn ftyp() -> Vec<u8> {
        let mut body = b"M4A ".to_vec(); // major brand
        body.extend_from_slice(&0u32.to_be_bytes()); // minor version
        body.extend_from_slice(b"M4A "); // compatible brand
        body.extend_from_slice(b"mp42"); // compatible brand
        body.extend_from_slice(b"isom"); // compatible brand
        atom(b"ftyp", &body)
    }

    fn build_m4a(with_artwork: bool) -> Vec<u8> {
        let mut ilst_body = Vec::new();
        ilst_body.extend(item_atom(b"\xa9ART", b"Test Artist"));
        ilst_body.extend(item_atom(b"\xa9nam", b"Test Title"));
        ilst_body.extend(item_atom(b"\xa9alb", b"Test Album"));
        ilst_body.extend(item_atom(b"\xa9day", b"2015"));
        if with_artwork {
            ilst_body.extend(item_atom(b"covr", &[0xff, 0xd8, 0xff, 0xe0]));
        }

        let mut meta_body = vec![0u8; 4]; // version/flags
        meta_body.extend(atom(b"ilst", &ilst_body));

        let udta_body = atom(b"meta", &meta_body);

        let stbl_body = atom(b"stsd", &stsd_body(2, 44100));
        let minf_body = atom(b"stbl", &stbl_body);
        let mdia_body = atom(b"minf", &minf_body);
        let trak_body = atom(b"mdia", &mdia_body);

        let mut moov_body = Vec::new();
        moov_body.extend(atom(b"mvhd", &mvhd_body(1000, 1000)));
        moov_body.extend(atom(b"trak", &trak_body));
        moov_body.extend(atom(b"udta", &udta_body));

        let mut file = ftyp();
        file.extend(atom(b"moov", &moov_body));
        file
    }

    fn write_temp(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.m4a", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn extracts_m4a_tags_and_technical_fields() {
        let path = write_temp("loist-m4a-test", &build_m4a(false));
        let extracted = extract(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(extracted.metadata.artist.as_deref(), Some("Test Artist"));
        assert_eq!(extracted.metadata.title.as_deref(), Some("Test Title"));
        assert_eq!(extracted.metadata.album.as_deref(), Some("Test Album"));
        assert_eq!(extracted.metadata.year, Some(2015));
        assert!(extracted.artwork.is_none());
    }

    #[test]
    fn extracts_m4a_cover_artwork() {
        let path = write_temp("loist-m4a-cover-test", &build_m4a(true));
        let extracted = extract(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let artwork = extracted.artwork.expect("covr atom should be parsed");
        assert_eq!(artwork.kind, ArtworkKind::Jpeg);
    }

    #[test]
    fn rejects_stream_without_an_ftyp_atom() {
        let path = write_temp("loist-m4a-bad", b"not an mp4 container at all");
        let err = extract(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert_eq!(err.kind, ErrorKind::MetadataExtractionFailed);
    }
}
