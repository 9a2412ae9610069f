//! PNG adapter: encoder di `image` seguito da `oxipng`.
//!
//! Solo lossless: qualità e chroma vengono ignorati. L'effort (0-10) seleziona
//! il preset di oxipng (0-6).

use super::Codec;
use crate::error::{CompressError, Result};
use crate::profile::{EncodingProfile, OutputFormat, MAX_EFFORT};
use crate::source::SourceImage;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, ImageFormat, RgbaImage};
use oxipng::{optimize_from_memory, Options as OxipngOptions, StripChunks};

/// Highest oxipng preset
const MAX_OXIPNG_PRESET: u8 = 6;

#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl PngCodec {
    pub fn oxipng_preset(effort: u8) -> u8 {
        (effort.min(MAX_EFFORT) as u32 * MAX_OXIPNG_PRESET as u32 / MAX_EFFORT as u32) as u8
    }
}

impl Codec for PngCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        let (width, height) = source.dimensions();
        let mut raw = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut raw, CompressionType::Fast, FilterType::Adaptive);

        // Opaque sources drop the alpha channel
        let written = if source.has_alpha() {
            encoder.write_image(source.rgba().as_raw(), width, height, ColorType::Rgba8)
        } else {
            encoder.write_image(&source.rgb_bytes(), width, height, ColorType::Rgb8)
        };
        written.map_err(|e| CompressError::encode_failed(OutputFormat::Png, e.to_string()))?;

        let mut opts = OxipngOptions::from_preset(Self::oxipng_preset(profile.effort));
        opts.strip = StripChunks::Safe;
        optimize_from_memory(&raw, &opts)
            .map_err(|e| CompressError::encode_failed(OutputFormat::Png, format!("oxipng: {}", e)))
    }

    fn decode(&self, data: &[u8]) -> Result<Option<RgbaImage>> {
        let decoded = image::load_from_memory_with_format(data, ImageFormat::Png).map_err(|e| {
            CompressError::encode_failed(OutputFormat::Png, format!("produced undecodable output: {}", e))
        })?;
        Ok(Some(decoded.into_rgba8()))
    }
}
