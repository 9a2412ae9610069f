//! Immagini sintetiche deterministiche e codec strumentati per i test.

use crate::codecs::{Codec, JpegCodec};
use crate::error::{CompressError, Result};
use crate::optimizer::cancel::{CancelHandle, CancelToken};
use crate::profile::{EncodingProfile, OutputFormat};
use crate::source::SourceImage;
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Smooth gradients with low-amplitude luma noise, classified photographic
pub fn photo_image(width: u32, height: u32) -> SourceImage {
    let mut state: u32 = 0x2545_F491;
    let pixels = RgbaImage::from_fn(width, height, |x, y| {
        // LCG noise in [-6, 6]
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = ((state >> 24) % 13) as i32 - 6;

        let fx = x as f64;
        let fy = y as f64;
        let r = 120.0 + 70.0 * (fx / 37.0).sin() + 40.0 * (fy / 53.0).cos();
        let g = 110.0 + 60.0 * ((fx + fy) / 41.0).sin();
        let b = 100.0 + 50.0 * (fy / 29.0).sin() - 30.0 * (fx / 61.0).cos();
        let channel = |v: f64| (v as i32 + noise).clamp(0, 255) as u8;
        Rgba([channel(r), channel(g), channel(b), 255])
    });
    SourceImage::from_rgba(pixels)
}

/// Flat shapes on a transparent background, classified graphic
pub fn logo_image(width: u32, height: u32) -> SourceImage {
    let (cx, cy) = (width as i64 / 3, height as i64 / 2);
    let radius = (width.min(height) as i64) / 4;
    let pixels = RgbaImage::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as i64 - cx, y as i64 - cy);
        if dx * dx + dy * dy <= radius * radius {
            Rgba([200, 30, 30, 255])
        } else if x >= width / 2 && x < width * 7 / 8 && y >= height / 4 && y < height * 3 / 4 {
            Rgba([30, 60, 200, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    SourceImage::from_rgba(pixels)
}

/// Wraps a codec and counts encode calls
pub struct CountingCodec<C> {
    inner: C,
    calls: AtomicUsize,
}

impl<C: Codec> CountingCodec<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<C: Codec> Codec for CountingCodec<C> {
    fn format(&self) -> OutputFormat {
        self.inner.format()
    }

    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode_bytes(source, profile)
    }

    fn decode(&self, data: &[u8]) -> Result<Option<RgbaImage>> {
        self.inner.decode(data)
    }
}

/// Synthetic JPEG-tagged encoder whose size jumps around in q40-70
pub struct ZigzagCodec;

impl ZigzagCodec {
    pub fn size_for(quality: u8) -> usize {
        let q = quality as usize;
        let bump = if (40..=70).contains(&q) { (q * 37 % 11) * 150 } else { 0 };
        200 + q * 20 + bump
    }
}

impl Codec for ZigzagCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode_bytes(&self, _source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        Ok(vec![0u8; Self::size_for(profile.quality)])
    }

    fn decode(&self, _data: &[u8]) -> Result<Option<RgbaImage>> {
        Ok(None)
    }
}

/// Synthetic JPEG-tagged encoder: 1000 + 100 bytes per quality step
pub struct LinearCodec;

impl LinearCodec {
    pub fn size_for(quality: u8) -> usize {
        1000 + quality as usize * 100
    }
}

impl Codec for LinearCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode_bytes(&self, _source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        Ok(vec![0u8; Self::size_for(profile.quality)])
    }

    fn decode(&self, _data: &[u8]) -> Result<Option<RgbaImage>> {
        Ok(None)
    }
}

/// Always fails with `EncodeFailed` for its format
pub struct FailingCodec(pub OutputFormat);

impl Codec for FailingCodec {
    fn format(&self) -> OutputFormat {
        self.0
    }

    fn encode_bytes(&self, _source: &SourceImage, _profile: &EncodingProfile) -> Result<Vec<u8>> {
        Err(CompressError::encode_failed(self.0, "encoder crashed"))
    }

    fn decode(&self, _data: &[u8]) -> Result<Option<RgbaImage>> {
        Ok(None)
    }
}

/// Real JPEG encoder that fires its cancel handle on the n-th encode
pub struct CancellingCodec {
    handle: CancelHandle,
    cancel_on: usize,
    calls: AtomicUsize,
}

impl CancellingCodec {
    pub fn new(handle: CancelHandle, cancel_on: usize) -> Self {
        Self {
            handle,
            cancel_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.handle.token()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Codec for CancellingCodec {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let data = JpegCodec.encode_bytes(source, profile)?;
        if call == self.cancel_on {
            self.handle.cancel();
        }
        Ok(data)
    }

    fn decode(&self, data: &[u8]) -> Result<Option<RgbaImage>> {
        JpegCodec.decode(data)
    }
}
