//! # Advanced Mode
//!
//! Profilo esplicito scelto dall'utente: esattamente un encode e uno scoring,
//! nessuna ricerca e nessun advisor. Un target opzionale imposta solo il flag
//! `target_met` e le dimensioni suggerite.

use super::cancel::CancelToken;
use super::job::{suggest_dimensions, AttemptSummary, JobReport};
use crate::codecs::{encode_with_retry, CodecRegistry};
use crate::error::Result;
use crate::profile::EncodingProfile;
use crate::quality;
use crate::source::SourceImage;
use std::time::Instant;
use tracing::info;

/// Encode once with `profile` and score the result
pub fn run(
    registry: &CodecRegistry,
    source: &SourceImage,
    profile: &EncodingProfile,
    target_bytes: Option<u64>,
    quality_floor: f64,
    cancel: &CancelToken,
) -> Result<JobReport> {
    let started = Instant::now();
    cancel.check()?;

    let codec = registry.get(profile.format)?;
    let candidate = encode_with_retry(codec.as_ref(), source, profile)?;
    cancel.check()?;
    let candidate = quality::score_candidate(source, candidate, codec.as_ref(), quality_floor)?;

    let target_met = target_bytes.map_or(true, |t| candidate.fits(t));
    let suggested_dimensions = target_bytes
        .filter(|_| !target_met)
        .and_then(|t| suggest_dimensions(source.width(), source.height(), candidate.size_bytes, t));

    info!(
        "✅ Advanced: {} -> {} bytes (SSIM {:?})",
        profile, candidate.size_bytes, candidate.ssim_score
    );

    let attempted = vec![AttemptSummary {
        format: profile.format,
        lossless: profile.is_lossless(),
        size_bytes: Some(candidate.size_bytes),
        ssim_score: candidate.ssim_score,
        status: None,
        iterations: 1,
        error: None,
    }];

    Ok(JobReport {
        candidate,
        mode: "advanced",
        target_bytes,
        target_met,
        search_status: None,
        iterations: 1,
        attempted,
        suggested_dimensions,
        suggested_format: None,
        elapsed: started.elapsed(),
    })
}
