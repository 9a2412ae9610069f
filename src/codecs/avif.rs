//! AVIF adapter su ravif (rav1e). Compilato solo con la feature `avif`.
//!
//! Nessun decoder AVIF è incluso: `decode` restituisce `None` e i candidati AVIF
//! restano con `FloorStatus::Unverified`.

use super::Codec;
use crate::error::{CompressError, Result};
use crate::profile::{EncodingProfile, OutputFormat, MAX_EFFORT};
use crate::source::SourceImage;
use image::RgbaImage;
use ravif::{Encoder, Img, RGBA8};

#[derive(Debug, Clone, Copy, Default)]
pub struct AvifCodec;

impl AvifCodec {
    /// ravif speed: 1 slowest/best, 10 fastest; ravif rejects 0
    pub fn speed(effort: u8) -> u8 {
        (MAX_EFFORT - effort.min(MAX_EFFORT)).clamp(1, 10)
    }
}

impl Codec for AvifCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::Avif
    }

    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        let (width, height) = source.dimensions();
        let pixels: Vec<RGBA8> = source
            .rgba()
            .pixels()
            .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect();

        // Single thread keeps the output byte-identical across runs
        let encoded = Encoder::new()
            .with_quality(profile.quality as f32)
            .with_speed(Self::speed(profile.effort))
            .with_num_threads(Some(1))
            .encode_rgba(Img::new(pixels.as_slice(), width as usize, height as usize))
            .map_err(|e| CompressError::encode_failed(OutputFormat::Avif, e.to_string()))?;
        Ok(encoded.avif_file)
    }

    fn decode(&self, _data: &[u8]) -> Result<Option<RgbaImage>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::photo_image;

    #[test]
    fn test_speed_mapping() {
        assert_eq!(AvifCodec::speed(0), 10);
        assert_eq!(AvifCodec::speed(4), 6);
        assert_eq!(AvifCodec::speed(9), 1);
        assert_eq!(AvifCodec::speed(10), 1);
    }

    #[test]
    fn test_max_effort_encodes() {
        let source = photo_image(32, 32);
        let profile = EncodingProfile::new(OutputFormat::Avif).with_quality(60).with_effort(MAX_EFFORT);
        let candidate = AvifCodec.encode(&source, &profile).unwrap();
        assert!(candidate.size_bytes > 0);
    }

    #[test]
    fn test_avif_encode_has_no_decoder() {
        let source = photo_image(64, 48);
        let profile = EncodingProfile::new(OutputFormat::Avif).with_quality(60).with_effort(0);
        let candidate = AvifCodec.encode(&source, &profile).unwrap();
        assert!(candidate.size_bytes > 0);
        assert!(AvifCodec.decode(&candidate.data).unwrap().is_none());
    }
}
