//! # Size-Targeting Search Module
//!
//! Ricerca limitata sul parametro di qualità di un formato per avvicinarsi il
//! più possibile a un budget in byte senza superarlo.
//!
//! ## Algoritmo:
//! 1. Tentativo alla qualità massima: se rientra nel budget la ricerca termina (`Saturated`)
//! 2. Bisezione sul punto medio dell'intervallo intero [min_quality, max_quality)
//! 3. Ogni tentativo: encode, confronto con il target, restringimento dell'intervallo
//! 4. Tracking del migliore visto (più grande sotto il target, più piccolo sopra)
//!
//! ## Terminazione:
//! - `Converged`: dimensione in [target - tolleranza, target]
//! - `Bracketed`: fuori tolleranza ma q+1 supera il target, quindi nessuna
//!   qualità intera si avvicina di più
//! - `FloorLimited`: anche la qualità minima supera il target, si restituisce il
//!   candidato più piccolo visto (mai sotto `min_quality`)
//! - `Approximate`: budget di iterazioni esaurito prima di una delle precedenti
//!
//! Gli encoder reali non sono strettamente monotoni: nessuna assunzione di
//! convergenza, l'intervallo si restringe a ogni tentativo quindi il loop termina sempre.
//! Lo scoring SSIM avviene una sola volta, sul candidato finale.

use crate::candidate::CandidateResult;
use crate::codecs::{encode_with_retry, Codec};
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::optimizer::cancel::CancelToken;
use crate::profile::EncodingProfile;
use crate::quality;
use crate::source::SourceImage;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Bounds of one search run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub min_quality: u8,
    pub max_quality: u8,
    pub max_iterations: u32,
    /// Fraction of the target below it still counted as a hit
    pub tolerance: f64,
}

impl SearchParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_quality: config.min_quality,
            max_quality: config.max_quality,
            max_iterations: config.max_iterations,
            tolerance: config.size_tolerance,
        }
    }

    /// Absolute tolerance in bytes for a target
    pub fn tolerance_bytes(&self, target_bytes: u64) -> u64 {
        (target_bytes as f64 * self.tolerance).round() as u64
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Size within the tolerance window below the target
    Converged,
    /// Highest allowed quality already fits
    Saturated,
    /// Outside the window, but the next quality step is over the target
    Bracketed,
    /// Budget exhausted; best-seen candidate returned
    Approximate,
    /// Lowest allowed quality is still over the target
    FloorLimited,
}

impl SearchStatus {
    /// As close to the target as the quality axis allows
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SearchStatus::Converged | SearchStatus::Saturated | SearchStatus::Bracketed
        )
    }
}

/// Result of one search: the chosen candidate plus how it was reached
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub candidate: CandidateResult,
    pub status: SearchStatus,
    pub iterations: u32,
    /// (quality, size) of every trial encode in order
    pub trials: Vec<(u8, u64)>,
}

struct Trials<'a> {
    codec: &'a dyn Codec,
    source: &'a SourceImage,
    base: EncodingProfile,
    target_bytes: u64,
    cancel: &'a CancelToken,
    sizes: BTreeMap<u8, u64>,
    order: Vec<(u8, u64)>,
    best_under: Option<CandidateResult>,
    best_over: Option<CandidateResult>,
}

impl<'a> Trials<'a> {
    fn run(&mut self, quality: u8) -> Result<u64> {
        if let Some(size) = self.sizes.get(&quality) {
            return Ok(*size);
        }
        self.cancel.check()?;

        let profile = self.base.with_quality(quality);
        let candidate = encode_with_retry(self.codec, self.source, &profile)?;
        let size = candidate.size_bytes;
        debug!(
            "Trial {} q{} -> {} bytes (target {})",
            profile.format, quality, size, self.target_bytes
        );
        self.sizes.insert(quality, size);
        self.order.push((quality, size));
        self.keep_if_better(candidate);
        Ok(size)
    }

    /// Keep only the best fitting and the smallest oversize candidate; drop the rest
    fn keep_if_better(&mut self, candidate: CandidateResult) {
        if candidate.fits(self.target_bytes) {
            let better = match &self.best_under {
                None => true,
                Some(best) => {
                    candidate.size_bytes > best.size_bytes
                        || (candidate.size_bytes == best.size_bytes
                            && candidate.profile.quality > best.profile.quality)
                }
            };
            if better {
                self.best_under = Some(candidate);
            }
        } else {
            let better = match &self.best_over {
                None => true,
                Some(best) => candidate.size_bytes < best.size_bytes,
            };
            if better {
                self.best_over = Some(candidate);
            }
        }
    }

    /// True when `quality` was tried and came out over the target
    fn is_over(&self, quality: u8) -> bool {
        self.sizes.get(&quality).map_or(false, |size| *size > self.target_bytes)
    }

    fn iterations(&self) -> u32 {
        self.order.len() as u32
    }

    fn finish(self, status: SearchStatus) -> Result<SearchOutcome> {
        let iterations = self.iterations();
        let candidate = match status {
            SearchStatus::FloorLimited => self.best_over.or(self.best_under),
            _ => self.best_under.or(self.best_over),
        }
        .ok_or_else(|| CompressError::Validation("search finished without encoding".to_string()))?;
        Ok(SearchOutcome {
            candidate,
            status,
            iterations,
            trials: self.order,
        })
    }
}

/// Find the encode closest to `target_bytes` without exceeding it.
///
/// Lossless profiles have no quality axis and are encoded exactly once.
/// Trial encodes are strictly sequential; the cancel token is checked before each one.
pub fn find_best_fit(
    codec: &dyn Codec,
    source: &SourceImage,
    base: &EncodingProfile,
    target_bytes: u64,
    params: &SearchParams,
    cancel: &CancelToken,
) -> Result<SearchOutcome> {
    if params.min_quality == 0 || params.min_quality > params.max_quality || params.max_quality > 100 {
        return Err(CompressError::Validation(format!(
            "invalid quality range {}-{}",
            params.min_quality, params.max_quality
        )));
    }

    let mut trials = Trials {
        codec,
        source,
        base: *base,
        target_bytes,
        cancel,
        sizes: BTreeMap::new(),
        order: Vec::new(),
        best_under: None,
        best_over: None,
    };

    if !base.has_quality_axis() {
        let size = trials.run(base.quality)?;
        let status = if size <= target_bytes {
            SearchStatus::Saturated
        } else {
            SearchStatus::FloorLimited
        };
        return trials.finish(status);
    }

    let budget = params.max_iterations.max(1);
    let window_low = target_bytes.saturating_sub(params.tolerance_bytes(target_bytes));

    if trials.run(params.max_quality)? <= target_bytes {
        return trials.finish(SearchStatus::Saturated);
    }

    let mut lo = params.min_quality;
    let mut hi = params.max_quality - 1;
    let mut collapsed = params.min_quality == params.max_quality;

    while !collapsed && trials.iterations() < budget {
        let mid = lo + (hi - lo) / 2;
        let size = trials.run(mid)?;

        if size <= target_bytes {
            if size >= window_low {
                return trials.finish(SearchStatus::Converged);
            }
            if mid == hi {
                collapsed = true;
            } else {
                lo = mid + 1;
            }
        } else if mid == lo {
            collapsed = true;
        } else {
            hi = mid - 1;
        }
    }

    let status = match &trials.best_under {
        Some(best) if best.size_bytes >= window_low => SearchStatus::Converged,
        Some(best) if trials.is_over(best.profile.quality.saturating_add(1)) => SearchStatus::Bracketed,
        Some(_) => SearchStatus::Approximate,
        None if trials.sizes.contains_key(&params.min_quality) => SearchStatus::FloorLimited,
        None => SearchStatus::Approximate,
    };
    debug!(
        "Search {} finished: {:?} after {} encodes",
        base.format,
        status,
        trials.iterations()
    );
    trials.finish(status)
}

/// Search, then score only the chosen candidate against the SSIM floor
pub fn find_best_fit_scored(
    codec: &dyn Codec,
    source: &SourceImage,
    base: &EncodingProfile,
    target_bytes: u64,
    params: &SearchParams,
    quality_floor: f64,
    cancel: &CancelToken,
) -> Result<SearchOutcome> {
    let mut outcome = find_best_fit(codec, source, base, target_bytes, params, cancel)?;
    cancel.check()?;
    outcome.candidate = quality::score_candidate(source, outcome.candidate, codec, quality_floor)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::FloorStatus;
    use crate::codecs::{JpegCodec, PngCodec};
    use crate::optimizer::cancel::CancelHandle;
    use crate::profile::OutputFormat;
    use crate::test_support::{logo_image, photo_image, CancellingCodec, CountingCodec, LinearCodec, ZigzagCodec};

    fn params() -> SearchParams {
        SearchParams {
            min_quality: 10,
            max_quality: 100,
            max_iterations: 12,
            tolerance: 0.05,
        }
    }

    fn jpeg_size(source: &SourceImage, quality: u8) -> u64 {
        JpegCodec
            .encode(source, &EncodingProfile::new(OutputFormat::Jpeg).with_quality(quality))
            .unwrap()
            .size_bytes
    }

    #[test]
    fn test_saturated_when_max_quality_fits() {
        let source = photo_image(64, 64);
        let base = EncodingProfile::new(OutputFormat::Jpeg);
        let outcome =
            find_best_fit(&JpegCodec, &source, &base, 10_000_000, &params(), &CancelToken::never()).unwrap();
        assert_eq!(outcome.status, SearchStatus::Saturated);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.candidate.profile.quality, 100);
    }

    #[test]
    fn test_converged_result_is_within_tolerance() {
        let source = photo_image(256, 192);
        let target = jpeg_size(&source, 70);
        let p = params();
        let outcome = find_best_fit(
            &JpegCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            target,
            &p,
            &CancelToken::never(),
        )
        .unwrap();

        assert!(outcome.iterations <= p.max_iterations);
        assert!(outcome.candidate.size_bytes <= target);
        match outcome.status {
            SearchStatus::Converged => {
                assert!(target - outcome.candidate.size_bytes <= p.tolerance_bytes(target))
            }
            SearchStatus::Bracketed => {
                let next = outcome.candidate.profile.quality + 1;
                assert!(outcome.trials.iter().any(|(q, s)| *q == next && *s > target));
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_bracketed_when_next_step_overshoots() {
        // 100 bytes per quality step: q99 is 1% under a q100-1 target
        let source = photo_image(8, 8);
        let target = LinearCodec::size_for(100) as u64 - 1;
        let p = SearchParams {
            tolerance: 0.001,
            ..params()
        };
        let outcome = find_best_fit(
            &LinearCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            target,
            &p,
            &CancelToken::never(),
        )
        .unwrap();
        assert_eq!(outcome.status, SearchStatus::Bracketed);
        assert_eq!(outcome.candidate.profile.quality, 99);
        assert!(outcome.status.is_success());
    }

    #[test]
    fn test_exhausted_budget_is_approximate() {
        let source = photo_image(8, 8);
        let target = LinearCodec::size_for(100) as u64 - 1;
        let p = SearchParams {
            max_iterations: 2,
            tolerance: 0.001,
            ..params()
        };
        let outcome = find_best_fit(
            &LinearCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            target,
            &p,
            &CancelToken::never(),
        )
        .unwrap();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.status, SearchStatus::Approximate);
        assert!(!outcome.status.is_success());
        assert!(outcome.candidate.size_bytes <= target);
    }

    #[test]
    fn test_cancel_between_encodes_stops_search() {
        let source = photo_image(64, 64);
        let handle = CancelHandle::new();
        let codec = CancellingCodec::new(handle, 3);
        let err = find_best_fit(
            &codec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            1,
            &params(),
            &codec.token(),
        )
        .unwrap_err();
        assert!(matches!(err, CompressError::Cancelled));
        assert_eq!(codec.calls(), 3);
    }

    #[test]
    fn test_floor_limited_never_goes_below_min_quality() {
        let source = photo_image(128, 128);
        let p = params();
        let outcome = find_best_fit(
            &JpegCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            200,
            &p,
            &CancelToken::never(),
        )
        .unwrap();
        assert_eq!(outcome.status, SearchStatus::FloorLimited);
        assert!(outcome.candidate.size_bytes > 200);
        assert!(outcome.trials.iter().all(|(q, _)| *q >= p.min_quality));
        assert!(outcome.trials.iter().any(|(q, _)| *q == p.min_quality));
    }

    #[test]
    fn test_non_monotonic_encoder_terminates() {
        let source = photo_image(16, 16);
        let codec = ZigzagCodec;
        let base = EncodingProfile::new(OutputFormat::Jpeg);
        for target in [50, 900, 1_500, 2_400, 5_000] {
            for max_iterations in [2, 3, 5, 12] {
                let p = SearchParams {
                    max_iterations,
                    ..params()
                };
                let outcome = find_best_fit(&codec, &source, &base, target, &p, &CancelToken::never()).unwrap();
                assert!(outcome.iterations <= max_iterations);

                // best seen: no trial fitting the target was larger than the result
                let best_fit = outcome.trials.iter().filter(|(_, s)| *s <= target).map(|(_, s)| *s).max();
                if let Some(best_fit) = best_fit {
                    assert_eq!(outcome.candidate.size_bytes, best_fit);
                }
            }
        }
    }

    #[test]
    fn test_search_never_repeats_quality() {
        let source = photo_image(96, 96);
        let counting = CountingCodec::new(JpegCodec);
        let target = jpeg_size(&source, 55);
        let outcome = find_best_fit(
            &counting,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            target,
            &params(),
            &CancelToken::never(),
        )
        .unwrap();
        let mut qualities: Vec<u8> = outcome.trials.iter().map(|(q, _)| *q).collect();
        let tried = qualities.len();
        qualities.sort_unstable();
        qualities.dedup();
        assert_eq!(qualities.len(), tried);
        assert_eq!(counting.calls(), tried);
    }

    #[test]
    fn test_lossless_is_single_shot() {
        let source = logo_image(64, 64);
        let counting = CountingCodec::new(PngCodec);
        let base = EncodingProfile::new(OutputFormat::Png);

        let outcome = find_best_fit(&counting, &source, &base, 10, &params(), &CancelToken::never()).unwrap();
        assert_eq!(outcome.status, SearchStatus::FloorLimited);
        assert_eq!(counting.calls(), 1);

        let outcome =
            find_best_fit(&counting, &source, &base, 10_000_000, &params(), &CancelToken::never()).unwrap();
        assert_eq!(outcome.status, SearchStatus::Saturated);
    }

    #[test]
    fn test_cancelled_before_first_encode() {
        let source = photo_image(32, 32);
        let handle = CancelHandle::new();
        let token = handle.token();
        handle.cancel();
        let err = find_best_fit(
            &JpegCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            1_000,
            &params(),
            &token,
        )
        .unwrap_err();
        assert!(matches!(err, CompressError::Cancelled));
    }

    #[test]
    fn test_scored_search_sets_floor_status() {
        let source = photo_image(128, 96);
        let target = jpeg_size(&source, 85);
        let outcome = find_best_fit_scored(
            &JpegCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            target,
            &params(),
            0.5,
            &CancelToken::never(),
        )
        .unwrap();
        let ssim = outcome.candidate.ssim_score.unwrap();
        assert!(ssim > 0.5);
        assert_eq!(outcome.candidate.floor, FloorStatus::Met);
    }

    #[test]
    fn test_invalid_range() {
        let source = photo_image(8, 8);
        let p = SearchParams {
            min_quality: 90,
            max_quality: 80,
            ..params()
        };
        assert!(find_best_fit(
            &JpegCodec,
            &source,
            &EncodingProfile::new(OutputFormat::Jpeg),
            1_000,
            &p,
            &CancelToken::never()
        )
        .is_err());
    }
}
