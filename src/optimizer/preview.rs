//! # Size-Estimation Preview
//!
//! Stima veloce e non autoritativa della dimensione di output, pensata come
//! feedback per la UI. Non sostituisce mai il `CandidateResult` finale.
//!
//! ## Metodi:
//! - `Sampled`: encode di un ritaglio centrale di ~`preview_sample_pixels`
//!   pixel, estrapolato sull'area totale (header contato una sola volta)
//! - `Heuristic`: nessun encode, modello bits-per-pixel per qualità e contenuto
//!   scalato con i rapporti di compressione tipici dei formati
//!
//! ## Rapporti di compressione (relativi a JPEG):
//! AVIF 0.5, WebP 0.75, JPEG 1.0, PNG 3.0
//!
//! ## Suggerimento di formato:
//! Quando un job manca il target, `suggest_format` confronta gli altri formati
//! alla qualità minima e propone il più piccolo che ci sta (o il più piccolo in assoluto).

use crate::capabilities::FormatCapabilities;
use crate::codecs::CodecRegistry;
use crate::error::Result;
use crate::profile::{EncodingProfile, OutputFormat};
use crate::source::SourceImage;
use serde::Serialize;
use tracing::{debug, warn};

/// Smallest side of the preview sample
const MIN_SAMPLE_SIDE: u32 = 16;

/// Typical output size relative to JPEG at the same quality
pub fn compression_ratio(format: OutputFormat) -> f64 {
    match format {
        OutputFormat::Avif => 0.5,
        OutputFormat::WebP => 0.75,
        OutputFormat::Jpeg => 1.0,
        OutputFormat::Png => 3.0,
    }
}

/// Fixed container/header bytes not proportional to area
fn header_overhead(format: OutputFormat) -> u64 {
    match format {
        OutputFormat::Jpeg => 600,
        OutputFormat::Png => 60,
        OutputFormat::WebP => 30,
        OutputFormat::Avif => 300,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    Sampled,
    Heuristic,
}

/// Advisory output size estimate
#[derive(Debug, Clone, Serialize)]
pub struct SizeEstimate {
    pub format: OutputFormat,
    pub profile: EncodingProfile,
    pub estimated_bytes: u64,
    pub method: EstimateMethod,
    /// Share of the source pixels actually encoded (0 for heuristic)
    pub sample_fraction: f64,
    pub description: &'static str,
}

/// Alternative format proposed when a job misses its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatSuggestion {
    pub format: OutputFormat,
    pub estimated_bytes: u64,
    pub achieves_target: bool,
}

/// Smallest other format whose estimate at `quality` fits `target_bytes`,
/// else the smallest other format overall. Estimation failures yield `None`.
pub fn suggest_format(
    source: &SourceImage,
    current: OutputFormat,
    target_bytes: u64,
    quality: u8,
    effort: u8,
    capabilities: &FormatCapabilities,
    registry: &CodecRegistry,
    sample_pixels: u32,
) -> Option<FormatSuggestion> {
    let estimates = match compare_formats(source, quality, effort, capabilities, registry, sample_pixels) {
        Ok(estimates) => estimates,
        Err(e) => {
            warn!("Format suggestion skipped: {}", e);
            return None;
        }
    };

    // sorted ascending: the first alternative is the smallest
    let mut alternatives = estimates.iter().filter(|e| e.format != current).peekable();
    let smallest = *alternatives.peek()?;
    let chosen = alternatives
        .find(|e| e.estimated_bytes <= target_bytes)
        .unwrap_or(smallest);

    debug!(
        "Suggesting {} at ~{} bytes for target {}",
        chosen.format, chosen.estimated_bytes, target_bytes
    );
    Some(FormatSuggestion {
        format: chosen.format,
        estimated_bytes: chosen.estimated_bytes,
        achieves_target: chosen.estimated_bytes <= target_bytes,
    })
}

/// Estimate by encoding a centered sample; falls back to the heuristic when the
/// sample encode fails for format-local reasons
pub fn estimate_size(
    source: &SourceImage,
    profile: &EncodingProfile,
    registry: &CodecRegistry,
    sample_pixels: u32,
) -> Result<SizeEstimate> {
    profile.validate()?;

    match sampled(source, profile, registry, sample_pixels) {
        Ok(estimate) => Ok(estimate),
        Err(e) if e.is_format_local() => {
            warn!("Sampled preview for {} failed ({}), using heuristic", profile.format, e);
            Ok(estimate_heuristic(source, profile))
        }
        Err(e) => Err(e),
    }
}

fn sampled(
    source: &SourceImage,
    profile: &EncodingProfile,
    registry: &CodecRegistry,
    sample_pixels: u32,
) -> Result<SizeEstimate> {
    let codec = registry.get(profile.format)?;
    let total = source.pixel_count();
    let overhead = header_overhead(profile.format);

    let (estimated_bytes, sample_fraction) = if total <= sample_pixels as u64 {
        let candidate = codec.encode(source, profile)?;
        (candidate.size_bytes, 1.0)
    } else {
        let scale = (sample_pixels as f64 / total as f64).sqrt();
        let w = ((source.width() as f64 * scale) as u32).clamp(MIN_SAMPLE_SIDE.min(source.width()), source.width());
        let h = ((source.height() as f64 * scale) as u32).clamp(MIN_SAMPLE_SIDE.min(source.height()), source.height());
        let sample = source.crop((source.width() - w) / 2, (source.height() - h) / 2, w, h)?;

        let encoded = codec.encode(&sample, profile)?;
        let fraction = (w as u64 * h as u64) as f64 / total as f64;
        let payload = encoded.size_bytes.saturating_sub(overhead) as f64 / fraction;
        (payload as u64 + overhead, fraction)
    };

    debug!(
        "Preview {}: ~{} bytes from {:.1}% sample",
        profile,
        estimated_bytes,
        sample_fraction * 100.0
    );
    Ok(SizeEstimate {
        format: profile.format,
        profile: *profile,
        estimated_bytes,
        method: EstimateMethod::Sampled,
        sample_fraction,
        description: profile.format.description(),
    })
}

/// Instant estimate without encoding: mozjpeg bits-per-pixel model scaled per format
pub fn estimate_heuristic(source: &SourceImage, profile: &EncodingProfile) -> SizeEstimate {
    let quality = if profile.is_lossless() { 90.0 } else { profile.quality as f64 };
    let flat = source.stats().flat_ratio.clamp(0.0, 1.0);

    let base_bpp = 0.1 + 0.016 * quality;
    let content_factor = 0.3 + 0.7 * (1.0 - flat);
    let bits = source.pixel_count() as f64 * base_bpp * content_factor * compression_ratio(profile.format);
    let estimated_bytes = (bits / 8.0) as u64 + header_overhead(profile.format);

    SizeEstimate {
        format: profile.format,
        profile: *profile,
        estimated_bytes,
        method: EstimateMethod::Heuristic,
        sample_fraction: 0.0,
        description: profile.format.description(),
    }
}

/// Estimate every available format at `quality`, smallest first.
///
/// Sources with transparency skip formats that cannot carry it.
pub fn compare_formats(
    source: &SourceImage,
    quality: u8,
    effort: u8,
    capabilities: &FormatCapabilities,
    registry: &CodecRegistry,
    sample_pixels: u32,
) -> Result<Vec<SizeEstimate>> {
    let mut estimates = Vec::new();
    for format in capabilities.available_formats() {
        if source.has_alpha() && !format.supports_transparency() {
            debug!("{} skipped in comparison: no transparency", format);
            continue;
        }
        let profile = EncodingProfile::new(format).with_quality(quality).with_effort(effort);
        estimates.push(estimate_size(source, &profile, registry, sample_pixels)?);
    }
    estimates.sort_by_key(|e| e.estimated_bytes);
    Ok(estimates)
}
