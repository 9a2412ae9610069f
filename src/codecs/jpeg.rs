//! JPEG adapter su MozJPEG.
//!
//! La trasparenza viene composta su bianco prima dell'encoding: JPEG non ha alpha.
//! MozJPEG segnala gli errori fatali di libjpeg con un panic, che qui viene
//! intercettato e convertito in `EncodeFailed`.

use super::Codec;
use crate::error::{CompressError, Result};
use crate::profile::{EncodingProfile, OutputFormat};
use crate::source::SourceImage;
use image::{ImageFormat, RgbaImage};
use mozjpeg::{ColorSpace, Compress};
use std::any::Any;
use std::panic;

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl Codec for JpegCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        let rgb = source.rgb_bytes();
        let (width, height) = source.dimensions();
        let profile = *profile;

        panic::catch_unwind(move || compress_rgb(&rgb, width, height, &profile))
            .map_err(|payload| {
                CompressError::encode_failed(OutputFormat::Jpeg, panic_message(payload.as_ref()))
            })?
            .map_err(|e| CompressError::encode_failed(OutputFormat::Jpeg, format!("mozjpeg: {}", e)))
    }

    fn decode(&self, data: &[u8]) -> Result<Option<RgbaImage>> {
        let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg).map_err(|e| {
            CompressError::encode_failed(OutputFormat::Jpeg, format!("produced undecodable output: {}", e))
        })?;
        Ok(Some(decoded.into_rgba8()))
    }
}

fn compress_rgb(rgb: &[u8], width: u32, height: u32, profile: &EncodingProfile) -> std::io::Result<Vec<u8>> {
    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(profile.quality as f32);

    let sampling = profile.chroma.pixel_sizes();
    comp.set_chroma_sampling_pixel_sizes(sampling, sampling);

    if profile.progressive {
        comp.set_progressive_mode();
    }
    comp.set_optimize_coding(true);

    // ~10% of raw RGB is a typical JPEG size
    let mut output = Vec::with_capacity((rgb.len() / 10).max(4096));
    {
        let mut writer = comp.start_compress(&mut output)?;
        writer.write_scanlines(rgb)?;
        writer.finish()?;
    }
    Ok(output)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("mozjpeg panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("mozjpeg panicked: {}", msg)
    } else {
        "mozjpeg panicked".to_string()
    }
}
