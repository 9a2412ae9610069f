//! # Source Image Module
//!
//! Questo modulo definisce l'immagine sorgente immutabile di un job di compressione.
//!
//! ## Responsabilità:
//! - `SourceImage`: buffer RGBA decodificato + metadata (dimensioni, alpha, formato)
//! - Provider di decodifica: da byte grezzi a `SourceImage` (`DecodeError` propagato)
//! - Classificazione del contenuto (fotografico vs grafico) calcolata una sola volta
//! - Ritaglio di regioni per l'anteprima delle dimensioni
//!
//! ## Ownership:
//! Un `SourceImage` non viene mai mutato. Il job lo condivide in `Arc` tra i
//! worker dei formati; il buffer viene liberato alla fine del job.

use crate::error::{CompressError, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Maximum distinct colors counted before the analysis stops early
const COLOR_COUNT_CAP: usize = 4096;

/// Pixels sampled for content analysis on large images
const ANALYSIS_SAMPLE_TARGET: u64 = 250_000;

/// Luma difference between neighbours counted as a hard edge
const HARD_EDGE_THRESHOLD: i32 = 64;

/// Photographic vs graphic classification of the pixel content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    /// High color variance, soft transitions
    Photographic,
    /// Few colors, flat regions or hard edges (logos, screenshots, line art)
    Graphic,
}

/// Statistics gathered once when the source is built
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentStats {
    /// Distinct RGBA colors in the sample, capped at 4096
    pub color_count: usize,
    /// Share of neighbouring sample pairs with identical color
    pub flat_ratio: f64,
    /// Share of neighbouring sample pairs separated by a hard luma edge
    pub edge_ratio: f64,
}

impl ContentStats {
    fn classify(&self) -> ContentClass {
        if self.color_count <= 256 || self.flat_ratio > 0.5 || self.edge_ratio > 0.15 {
            ContentClass::Graphic
        } else {
            ContentClass::Photographic
        }
    }
}

/// Immutable decoded image plus metadata
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: RgbaImage,
    has_alpha: bool,
    source_format: Option<ImageFormat>,
    stats: ContentStats,
    content: ContentClass,
}

impl SourceImage {
    /// Decode raw file bytes into a source image
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let source_format = image::guess_format(bytes).ok();
        let decoded = image::load_from_memory(bytes).map_err(CompressError::Decode)?;
        debug!(
            "Decoded {}x{} source ({:?}, {:?})",
            decoded.width(),
            decoded.height(),
            source_format,
            decoded.color()
        );
        Ok(Self::from_dynamic(decoded, source_format))
    }

    /// Build from an already decoded image
    pub fn from_dynamic(image: DynamicImage, source_format: Option<ImageFormat>) -> Self {
        let declares_alpha = image.color().has_alpha();
        Self::build(image.into_rgba8(), declares_alpha, source_format)
    }

    /// Build from an RGBA buffer; alpha counts only if some pixel is not opaque
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self::build(pixels, true, None)
    }

    fn build(pixels: RgbaImage, declares_alpha: bool, source_format: Option<ImageFormat>) -> Self {
        let has_alpha = declares_alpha && pixels.pixels().any(|p| p[3] < u8::MAX);
        let stats = analyze(&pixels);
        let content = stats.classify();
        Self {
            pixels,
            has_alpha,
            source_format,
            stats,
            content,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn source_format(&self) -> Option<ImageFormat> {
        self.source_format
    }

    pub fn content(&self) -> ContentClass {
        self.content
    }

    pub fn stats(&self) -> &ContentStats {
        &self.stats
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    /// RGB bytes with any transparency composited over white
    pub fn rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixel_count() as usize * 3);
        for px in self.pixels.pixels() {
            let [r, g, b] = composite_over_white(px.0);
            out.extend_from_slice(&[r, g, b]);
        }
        out
    }

    /// Copy of a rectangular region, keeping the source metadata
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || x + width > self.width() || y + height > self.height() {
            return Err(CompressError::Validation(format!(
                "Crop {}x{}+{}+{} outside {}x{} image",
                width,
                height,
                x,
                y,
                self.width(),
                self.height()
            )));
        }
        let region = image::imageops::crop_imm(&self.pixels, x, y, width, height).to_image();
        Ok(Self {
            pixels: region,
            has_alpha: self.has_alpha,
            source_format: self.source_format,
            stats: self.stats,
            content: self.content,
        })
    }
}

/// Alpha-composite one RGBA pixel over the canonical white background
pub fn composite_over_white(px: [u8; 4]) -> [u8; 3] {
    let alpha = px[3] as u32;
    if alpha == 255 {
        return [px[0], px[1], px[2]];
    }
    let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
    [blend(px[0]), blend(px[1]), blend(px[2])]
}

fn luma(px: &[u8; 4]) -> i32 {
    (px[0] as i32 * 299 + px[1] as i32 * 587 + px[2] as i32 * 114) / 1000
}

fn analyze(pixels: &RgbaImage) -> ContentStats {
    let (width, height) = pixels.dimensions();
    let total = width as u64 * height as u64;
    if total == 0 {
        return ContentStats {
            color_count: 0,
            flat_ratio: 1.0,
            edge_ratio: 0.0,
        };
    }

    // Sample every `step`-th row, comparing horizontal neighbours inside the row
    let step = ((total / ANALYSIS_SAMPLE_TARGET) as f64).sqrt().ceil().max(1.0) as u32;
    let mut colors = HashSet::new();
    let mut pairs = 0u64;
    let mut flat = 0u64;
    let mut edges = 0u64;

    for y in (0..height).step_by(step as usize) {
        let mut prev: Option<[u8; 4]> = None;
        for x in (0..width).step_by(step as usize) {
            let px = pixels.get_pixel(x, y).0;
            if colors.len() < COLOR_COUNT_CAP {
                colors.insert(px);
            }
            if let Some(prev) = prev {
                pairs += 1;
                if prev == px {
                    flat += 1;
                } else if (luma(&prev) - luma(&px)).abs() > HARD_EDGE_THRESHOLD {
                    edges += 1;
                }
            }
            prev = Some(px);
        }
    }

    let pairs = pairs.max(1) as f64;
    ContentStats {
        color_count: colors.len(),
        flat_ratio: flat as f64 / pairs,
        edge_ratio: edges as f64 / pairs,
    }
}
