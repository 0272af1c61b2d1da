//! WAV (RIFF/WAVE) metadata extraction, via `lofty`.

use std::path::Path;

use loist_common::Result;

use super::Extracted;

pub fn extract(path: &Path) -> Result<Extracted> {
    super::extract_via_lofty(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loist_common::ErrorKind;

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(id);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn info_subchunk(id: &[u8; 4], value: &str) -> Vec<u8> {
        let mut body = value.as_bytes().to_vec();
        body.push(0);
        chunk(id, &body)
    }

    fn build_wav(channels: u16, sample_rate: u32, bits_per_sample: u16, data_len: usize) -> Vec<u8> {
        let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
        let block_align = channels * (bits_per_sample / 8);

        let mut fmt_body = Vec::new();
        fmt_body.extend_from_slice(&1u16.to_le_bytes()); // PCM
        fmt_body.extend_from_slice(&channels.to_le_bytes());
        fmt_body.extend_from_slice(&sample_rate.to_le_bytes());
        fmt_body.extend_from_slice(&byte_rate.to_le_bytes());
        fmt_body.extend_from_slice(&block_align.to_le_bytes());
        fmt_body.extend_from_slice(&bits_per_sample.to_le_bytes());

        let mut info_body = b"INFO".to_vec();
        info_body.extend(info_subchunk(b"IART", "Test Artist"));
        info_body.extend(info_subchunk(b"INAM", "Test Title"));
        info_body.extend(info_subchunk(b"IPRD", "Test Album"));

        let data = vec![0u8; data_len];

        let mut riff_body = b"WAVE".to_vec();
        riff_body.extend(chunk(b"fmt ", &fmt_body));
        riff_body.extend(chunk(b"LIST", &info_body));
        riff_body.extend(chunk(b"data", &data));

        let mut file = b"RIFF".to_vec();
        file.extend_from_slice(&(riff_body.len() as u32).to_le_bytes());
        file.extend(riff_body);
        file
    }

    #[test]
    fn extracts_technical_fields_and_info_tags() {
        let bytes = build_wav(2, 44100, 16, 44100 * 4);
        let dir = std::env::temp_dir().join(format!("loist-wav-test-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&dir, &bytes).unwrap();

        let extracted = extract(&dir).unwrap();
        std::fs::remove_file(&dir).ok();

        assert_eq!(extracted.metadata.channels, 2);
        assert_eq!(extracted.metadata.sample_rate_hz, 44100);
        assert_eq!(extracted.metadata.bit_depth, Some(16));
        assert_eq!(extracted.metadata.artist.as_deref(), Some("Test Artist"));
        assert_eq!(extracted.metadata.title.as_deref(), Some("Test Title"));
        assert_eq!(extracted.metadata.album.as_deref(), Some("Test Album"));
        assert!((extracted.metadata.duration_seconds - 1.0).abs() < 0.01);
    }

    #[test]
    fn rejects_non_riff_stream() {
        let dir = std::env::temp_dir().join(format!("loist-wav-bad-{}.wav", uuid::Uuid::new_v4()));
        std::fs::write(&dir, b"not a riff file at all").unwrap();
        let err = extract(&dir).unwrap_err();
        std::fs::remove_file(&dir).ok();
        assert_eq!(err.kind, ErrorKind::MetadataExtractionFailed);
    }
}
