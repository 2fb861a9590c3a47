//! WAV container for raw provider audio.
//!
//! The provider returns bare mono 16-bit little-endian PCM. `encode_wav`
//! prepends the canonical 44-byte RIFF header so the clip is playable.

use thiserror::Error;

/// Sample rate of the provider's PCM output.
pub const SAMPLE_RATE: u32 = 24_000;
pub const HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;
const FORMAT_PCM: u16 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("PCM payload has odd length {0}; 16-bit samples need an even byte count")]
    OddLength(usize),

    #[error("PCM payload of {0} bytes does not fit a 32-bit RIFF size field")]
    TooLarge(usize),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Malformed WAV header: {0}")]
    MalformedHeader(&'static str),
}

/// Encode PCM samples into a WAV file image.
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, CodecError> {
    if pcm.len() % 2 != 0 {
        return Err(CodecError::OddLength(pcm.len()));
    }
    if sample_rate == 0 {
        return Err(CodecError::InvalidSampleRate(sample_rate));
    }
    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|n| n.checked_add(36).is_some())
        .ok_or(CodecError::TooLarge(pcm.len()))?;
    let byte_rate = sample_rate
        .checked_mul(u32::from(BLOCK_ALIGN))
        .ok_or(CodecError::InvalidSampleRate(sample_rate))?;

    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    Ok(out)
}

/// Decoded fields of a canonical 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::MalformedHeader("shorter than 44 bytes"));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(CodecError::MalformedHeader("missing RIFF/WAVE tags"));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(CodecError::MalformedHeader("unexpected chunk layout"));
        }
        let u16_at = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
        let u32_at =
            |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
        Ok(Self {
            riff_size: u32_at(4),
            format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        f64::from(self.data_size) / f64::from(self.byte_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_one_second_at_24k() {
        let pcm = vec![0u8; 48_000];
        let wav = encode_wav(&pcm, 24_000).unwrap();
        assert_eq!(wav.len(), 48_044);

        let h = WavHeader::parse(&wav).unwrap();
        assert_eq!(h.byte_rate, 48_000);
        assert_eq!(h.data_size, 48_000);
        assert_eq!(h.riff_size, 36 + 48_000);
        assert_eq!(h.channels, 1);
        assert_eq!(h.bits_per_sample, 16);
        assert_eq!(h.block_align, 2);
        assert_eq!(h.format, 1);
        assert!((h.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deterministic() {
        let pcm: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        assert_eq!(encode_wav(&pcm, 16_000), encode_wav(&pcm, 16_000));
        assert_eq!(&encode_wav(&pcm, 16_000).unwrap()[HEADER_LEN..], &pcm[..]);
    }

    #[test]
    fn test_empty_payload() {
        let wav = encode_wav(&[], SAMPLE_RATE).unwrap();
        assert_eq!(wav.len(), HEADER_LEN);
        assert_eq!(WavHeader::parse(&wav).unwrap().data_size, 0);
    }

    #[test]
    fn test_odd_length_rejected() {
        assert_eq!(encode_wav(&[1, 2, 3], SAMPLE_RATE), Err(CodecError::OddLength(3)));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert_eq!(encode_wav(&[0, 0], 0), Err(CodecError::InvalidSampleRate(0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(WavHeader::parse(&[0u8; 10]).is_err());
        assert!(WavHeader::parse(&[0u8; 44]).is_err());
    }

    #[test]
    fn test_readable_by_hound() {
        let samples: [i16; 4] = [0, 1000, -1000, i16::MAX];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let wav = encode_wav(&pcm, 22_050).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }
}
