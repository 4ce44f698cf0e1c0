/// Wrap raw little-endian 16-bit PCM bytes in a RIFF/WAVE container.
///
/// The payload is copied verbatim; the 44-byte header is derived from
/// `sample_rate` and `channels`. Callers are responsible for supplying sane
/// values - an empty payload yields a structurally valid, silent container.
pub fn encode_wav(samples: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(44 + samples.len());

    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * 2;
    let block_align = channels * 2;
    let data_size = samples.len() as u32;

    // RIFF header
    buffer.extend_from_slice(b"RIFF");
    buffer.extend_from_slice(&(36 + data_size).to_le_bytes());
    buffer.extend_from_slice(b"WAVE");

    // fmt chunk
    buffer.extend_from_slice(b"fmt ");
    buffer.extend_from_slice(&16u32.to_le_bytes());
    buffer.extend_from_slice(&1u16.to_le_bytes());
    buffer.extend_from_slice(&channels.to_le_bytes());
    buffer.extend_from_slice(&sample_rate.to_le_bytes());
    buffer.extend_from_slice(&byte_rate.to_le_bytes());
    buffer.extend_from_slice(&block_align.to_le_bytes());
    buffer.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buffer.extend_from_slice(b"data");
    buffer.extend_from_slice(&data_size.to_le_bytes());
    buffer.extend_from_slice(samples);

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn header_markers_and_layout() {
        let samples = [0u8, 1, 2, 3, 4, 5];
        let bytes = encode_wav(&samples, 24_000, 1);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1);
        assert_eq!(u16_at(&bytes, 34), 16);
    }

    #[test]
    fn length_and_size_fields_track_payload() {
        for len in [0usize, 1, 2, 3, 17, 1024] {
            let samples: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let bytes = encode_wav(&samples, 24_000, 1);

            assert_eq!(bytes.len(), 44 + len);
            assert_eq!(u32_at(&bytes, 4), 36 + len as u32);
            assert_eq!(u32_at(&bytes, 40), len as u32);
            assert_eq!(&bytes[44..], samples.as_slice());
        }
    }

    #[test]
    fn derived_rate_fields() {
        let bytes = encode_wav(&[0u8; 4], 24_000, 1);
        assert_eq!(u32_at(&bytes, 24), 24_000);
        assert_eq!(u32_at(&bytes, 28), 48_000);
        assert_eq!(u16_at(&bytes, 32), 2);

        let stereo = encode_wav(&[0u8; 8], 44_100, 2);
        assert_eq!(u32_at(&stereo, 24), 44_100);
        assert_eq!(u32_at(&stereo, 28), 176_400);
        assert_eq!(u16_at(&stereo, 32), 4);
        assert_eq!(u16_at(&stereo, 22), 2);
    }

    #[test]
    fn empty_payload_is_a_valid_silent_container() {
        let bytes = encode_wav(&[], 24_000, 1);
        assert_eq!(bytes.len(), 44);
        assert_eq!(u32_at(&bytes, 4), 36);
        assert_eq!(u32_at(&bytes, 40), 0);
    }

    #[test]
    fn two_byte_payload_at_16khz() {
        let bytes = encode_wav(&[0x01, 0x02], 16_000, 1);
        assert_eq!(bytes.len(), 46);
        assert_eq!(u32_at(&bytes, 4), 38);
        assert_eq!(u32_at(&bytes, 40), 2);
        assert_eq!(u32_at(&bytes, 28), 32_000);
        assert_eq!(&bytes[44..], &[0x01, 0x02]);
    }

    #[test]
    fn encoding_is_deterministic() {
        let samples: Vec<u8> = (0..97).map(|i| (i * 7 % 256) as u8).collect();
        assert_eq!(
            encode_wav(&samples, 24_000, 1),
            encode_wav(&samples, 24_000, 1)
        );
    }
}
