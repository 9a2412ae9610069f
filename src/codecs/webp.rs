//! WebP adapter su libwebp.
//!
//! Lossy (sempre 4:2:0) oppure lossless. L'effort mappa sul `method` di libwebp
//! (0-6); in lossless la quality di libwebp controlla lo sforzo di compressione
//! e viene derivata anch'essa dall'effort.

use super::Codec;
use crate::error::{CompressError, Result};
use crate::profile::{EncodingProfile, OutputFormat, MAX_EFFORT};
use crate::source::SourceImage;
use image::{Rgba, RgbaImage};

/// Highest libwebp `method`
const MAX_WEBP_METHOD: u8 = 6;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

impl Codec for WebpCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        let (width, height) = source.dimensions();
        let rgb;
        let encoder = if source.has_alpha() {
            webp::Encoder::from_rgba(source.rgba().as_raw(), width, height)
        } else {
            rgb = source.rgb_bytes();
            webp::Encoder::from_rgb(&rgb, width, height)
        };

        let mut config = webp::WebPConfig::new()
            .map_err(|_| CompressError::encode_failed(OutputFormat::WebP, "failed to create WebPConfig"))?;
        config.method = profile.effort.min(MAX_WEBP_METHOD) as i32;
        if profile.lossless {
            config.lossless = 1;
            config.quality = (profile.effort.min(MAX_EFFORT) as f32) * 10.0;
        } else {
            config.lossless = 0;
            config.quality = profile.quality as f32;
        }

        let encoded = encoder
            .encode_advanced(&config)
            .map_err(|e| CompressError::encode_failed(OutputFormat::WebP, format!("libwebp: {:?}", e)))?;
        Ok(encoded.to_vec())
    }

    fn decode(&self, data: &[u8]) -> Result<Option<RgbaImage>> {
        let decoded = webp::Decoder::new(data).decode().ok_or_else(|| {
            CompressError::encode_failed(OutputFormat::WebP, "produced undecodable output")
        })?;
        let (width, height) = (decoded.width(), decoded.height());
        let channels = if decoded.is_alpha() { 4 } else { 3 };
        let pixels: &[u8] = &decoded;

        let image = RgbaImage::from_fn(width, height, |x, y| {
            let i = (y as usize * width as usize + x as usize) * channels;
            let alpha = if channels == 4 { pixels[i + 3] } else { u8::MAX };
            Rgba([pixels[i], pixels[i + 1], pixels[i + 2], alpha])
        });
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{logo_image, photo_image};

    #[test]
    fn test_webp_lossy_is_deterministic() {
        let source = photo_image(128, 96);
        let profile = EncodingProfile::new(OutputFormat::WebP).with_quality(75);
        let a = WebpCodec.encode(&source, &profile).unwrap();
        let b = WebpCodec.encode(&source, &profile).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(&a.data[..4], b"RIFF");
        assert_eq!(&a.data[8..12], b"WEBP");
    }

    #[test]
    fn test_webp_lossless_keeps_pixels() {
        let source = logo_image(64, 64);
        let profile = EncodingProfile::new(OutputFormat::WebP).with_lossless(true);
        let candidate = WebpCodec.encode(&source, &profile).unwrap();
        let decoded = WebpCodec.decode(&candidate.data).unwrap().unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
        // fully transparent pixels may have their color zeroed, compare visible ones
        for (a, b) in decoded.pixels().zip(source.rgba().pixels()) {
            assert_eq!(a[3], b[3]);
            if b[3] == 255 {
                assert_eq!(a, b);
            }
        }
    }
}
