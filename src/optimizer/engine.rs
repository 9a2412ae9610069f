//! # Compression Engine
//!
//! Punto di ingresso del motore: dispatch sulla modalità del job.
//!
//! ## Responsabilità:
//! - Tiene `Config`, `FormatCapabilities` e `CodecRegistry` (read-only, condivisi)
//! - `compress`: Quick (ricerca + advisor) oppure Advanced (un encode)
//! - Suggerimento di un formato alternativo quando il target non è raggiunto
//! - Slot di encode condivisi: al massimo `workers` encode in volo per engine
//! - `preview` / `compare_formats`: stime veloci di dimensione
//!
//! Ogni job è indipendente: il motore non ha stato mutabile e può servire più
//! job in parallelo da task diversi. Il lavoro CPU-bound gira su
//! `spawn_blocking`, mai sul thread che ha creato il job.
//!
//! ## Esempio:
//! ```rust,ignore
//! let engine = CompressionEngine::new(Config::default())?;
//! let source = Arc::new(SourceImage::decode(&bytes)?);
//! let job = CompressionJob::quick(source, 500_000);
//! let report = engine.compress(job, &CancelToken::never()).await?;
//! ```

use super::advanced;
use super::cancel::CancelToken;
use super::job::{CompressionJob, JobMode, JobReport};
use super::preview::{self, SizeEstimate};
use super::quick::{self, QuickContext};
use crate::capabilities::FormatCapabilities;
use crate::codecs::CodecRegistry;
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::profile::EncodingProfile;
use crate::source::SourceImage;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Shared, read-only engine state
#[derive(Debug, Clone)]
pub struct CompressionEngine {
    config: Arc<Config>,
    capabilities: FormatCapabilities,
    registry: CodecRegistry,
    encode_slots: Arc<Semaphore>,
}

impl CompressionEngine {
    /// Validate the config and detect codecs once
    pub fn new(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| CompressError::Validation(e.to_string()))?;
        let capabilities = FormatCapabilities::detect(&config);
        let registry = CodecRegistry::new(&capabilities);
        Ok(Self::with_parts(config, capabilities, registry))
    }

    /// Explicit capabilities and adapters (tests, embedders)
    pub fn with_parts(config: Config, capabilities: FormatCapabilities, registry: CodecRegistry) -> Self {
        debug!("Engine codecs: {:?}", registry);
        let encode_slots = Arc::new(Semaphore::new(config.workers.max(1)));
        Self {
            config: Arc::new(config),
            capabilities,
            registry,
            encode_slots,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn capabilities(&self) -> &FormatCapabilities {
        &self.capabilities
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Run one job to completion or cancellation
    pub async fn compress(&self, job: CompressionJob, cancel: &CancelToken) -> Result<JobReport> {
        if !(job.quality_floor > 0.0 && job.quality_floor <= 1.0) {
            return Err(CompressError::Validation(format!(
                "quality floor must be in (0, 1], got {}",
                job.quality_floor
            )));
        }
        cancel.check()?;

        info!(
            "🚀 {} job on {}x{} {:?} source",
            job.mode.name(),
            job.source.width(),
            job.source.height(),
            job.source.content()
        );

        let source = Arc::clone(&job.source);
        let mut report = self.dispatch(job, cancel).await?;

        if let (false, Some(target)) = (report.target_met, report.target_bytes) {
            cancel.check()?;
            report.suggested_format = self.suggest_format(source, report.candidate.format, target).await;
        }
        Ok(report)
    }

    async fn dispatch(&self, job: CompressionJob, cancel: &CancelToken) -> Result<JobReport> {
        match job.mode {
            JobMode::Quick { target_bytes } => {
                let ctx = QuickContext {
                    config: &self.config,
                    capabilities: &self.capabilities,
                    registry: &self.registry,
                    encode_slots: &self.encode_slots,
                };
                quick::run(
                    ctx,
                    job.source,
                    target_bytes,
                    job.quality_floor,
                    &job.allowed_formats,
                    cancel,
                )
                .await
            }
            JobMode::Advanced { profile, target_bytes } => {
                if !self.capabilities.is_available(profile.format) {
                    return Err(CompressError::CodecUnavailable(profile.format));
                }
                let registry = self.registry.clone();
                let source = job.source;
                let cancel = cancel.clone();
                let floor = job.quality_floor;
                let permit = Arc::clone(&self.encode_slots)
                    .acquire_owned()
                    .await
                    .map_err(|e| CompressError::Validation(format!("encode slots closed: {}", e)))?;
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    advanced::run(&registry, &source, &profile, target_bytes, floor, &cancel)
                })
                .await
                .map_err(|e| CompressError::encode_failed(profile.format, format!("worker failed: {}", e)))?
            }
        }
    }

    /// Preview-based alternative to `current` at the lowest allowed quality
    async fn suggest_format(
        &self,
        source: Arc<SourceImage>,
        current: crate::profile::OutputFormat,
        target_bytes: u64,
    ) -> Option<preview::FormatSuggestion> {
        let registry = self.registry.clone();
        let capabilities = self.capabilities;
        let quality = self.config.min_quality;
        let effort = self.config.default_effort;
        let sample_pixels = self.config.preview_sample_pixels;
        tokio::task::spawn_blocking(move || {
            preview::suggest_format(
                &source,
                current,
                target_bytes,
                quality,
                effort,
                &capabilities,
                &registry,
                sample_pixels,
            )
        })
        .await
        .ok()
        .flatten()
    }

    /// Fast advisory size estimate for one profile
    pub async fn preview(&self, source: Arc<SourceImage>, profile: EncodingProfile) -> Result<SizeEstimate> {
        if !self.capabilities.is_available(profile.format) {
            return Err(CompressError::CodecUnavailable(profile.format));
        }
        let registry = self.registry.clone();
        let sample_pixels = self.config.preview_sample_pixels;
        tokio::task::spawn_blocking(move || preview::estimate_size(&source, &profile, &registry, sample_pixels))
            .await
            .map_err(|e| CompressError::encode_failed(profile.format, format!("worker failed: {}", e)))?
    }

    /// Estimates for every available format, smallest first
    pub async fn compare_formats(&self, source: Arc<SourceImage>, quality: u8) -> Result<Vec<SizeEstimate>> {
        let registry = self.registry.clone();
        let capabilities = self.capabilities;
        let effort = self.config.default_effort;
        let sample_pixels = self.config.preview_sample_pixels;
        tokio::task::spawn_blocking(move || {
            preview::compare_formats(&source, quality, effort, &capabilities, &registry, sample_pixels)
        })
        .await
        .map_err(|e| CompressError::Validation(format!("worker failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::FloorStatus;
    use crate::codecs::{Codec, JpegCodec};
    use crate::optimizer::cancel::CancelHandle;
    use crate::profile::{ChromaSubsampling, OutputFormat};
    use crate::search::SearchStatus;
    use crate::test_support::{logo_image, photo_image, CountingCodec, FailingCodec, LinearCodec};

    const CORE: [OutputFormat; 3] = [OutputFormat::Jpeg, OutputFormat::WebP, OutputFormat::Png];

    fn engine(config: Config) -> CompressionEngine {
        let caps = FormatCapabilities::with_avif(false);
        CompressionEngine::with_parts(config, caps, CodecRegistry::new(&caps))
    }

    #[tokio::test]
    async fn test_quick_photo_hits_target() {
        // reduced-resolution photographic Quick job, target derived from a real encode
        let source = Arc::new(photo_image(400, 300));
        let target = JpegCodec
            .encode(&source, &EncodingProfile::new(OutputFormat::Jpeg).with_quality(85))
            .unwrap()
            .size_bytes
            * 102
            / 100;
        let engine = engine(Config::default());
        let job = CompressionJob::quick(source, target)
            .with_quality_floor(0.85)
            .with_allowed_formats(CORE.to_vec());

        let report = engine.compress(job, &CancelToken::never()).await.unwrap();
        assert_ne!(report.candidate.format, OutputFormat::Png);
        assert!(report.target_met);
        assert!(report.candidate.size_bytes <= target);
        assert!(report.candidate.ssim_score.unwrap() >= 0.85);
        assert!(report.constraints_met());
        if report.search_status == Some(SearchStatus::Converged) {
            let tol = (target as f64 * engine.config().size_tolerance).round() as u64;
            assert!(target - report.candidate.size_bytes <= tol);
        }
    }

    #[tokio::test]
    async fn test_quick_transparent_logo_stays_lossless() {
        let source = Arc::new(logo_image(256, 256));
        let engine = engine(Config::default());

        for target in [500_000, 50] {
            let job = CompressionJob::quick(Arc::clone(&source), target).with_allowed_formats(CORE.to_vec());
            let report = engine.compress(job, &CancelToken::never()).await.unwrap();
            assert!(report.candidate.profile.is_lossless());
            assert!(matches!(report.candidate.format, OutputFormat::Png | OutputFormat::WebP));
            assert_eq!(report.candidate.ssim_score, Some(1.0));
            assert_eq!(report.target_met, report.candidate.size_bytes <= target);
            if !report.target_met {
                assert!(!report.constraints_met());
                assert!(report.suggested_dimensions.is_some());
            }
        }
    }

    #[tokio::test]
    async fn test_quick_never_names_avif_when_unavailable() {
        let source = Arc::new(photo_image(96, 96));
        let engine = engine(Config::default());
        let job = CompressionJob::quick(source, 100);
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();
        assert_ne!(report.candidate.format, OutputFormat::Avif);
        assert!(report.attempted.iter().all(|a| a.format != OutputFormat::Avif));
    }

    #[tokio::test]
    async fn test_advanced_single_encode() {
        let counting = Arc::new(CountingCodec::new(JpegCodec));
        let caps = FormatCapabilities::with_avif(false);
        let registry = CodecRegistry::new(&caps).with_codec(counting.clone());
        let engine = CompressionEngine::with_parts(Config::default(), caps, registry);

        let profile = EncodingProfile::new(OutputFormat::Jpeg)
            .with_quality(80)
            .with_chroma(ChromaSubsampling::Cs420)
            .with_progressive(true);
        let job = CompressionJob::advanced(Arc::new(photo_image(200, 150)), profile);
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();

        assert_eq!(counting.calls(), 1);
        assert_eq!(report.candidate.profile, profile);
        assert_ne!(report.candidate.floor, FloorStatus::Unverified);
    }

    #[tokio::test]
    async fn test_advanced_unavailable_codec() {
        let engine = engine(Config::default());
        let job = CompressionJob::advanced(
            Arc::new(photo_image(32, 32)),
            EncodingProfile::new(OutputFormat::Avif),
        );
        let err = engine.compress(job, &CancelToken::never()).await.unwrap_err();
        assert!(matches!(err, CompressError::CodecUnavailable(OutputFormat::Avif)));
    }

    #[tokio::test]
    async fn test_cancelled_job_returns_cancelled() {
        let handle = CancelHandle::new();
        let token = handle.token();
        handle.cancel();
        let engine = engine(Config::default());
        let job = CompressionJob::quick(Arc::new(photo_image(64, 64)), 1_000);
        let err = engine.compress(job, &token).await.unwrap_err();
        assert!(matches!(err, CompressError::Cancelled));
    }

    #[tokio::test]
    async fn test_invalid_floor_rejected() {
        let engine = engine(Config::default());
        let job = CompressionJob::quick(Arc::new(photo_image(16, 16)), 1_000).with_quality_floor(1.5);
        assert!(matches!(
            engine.compress(job, &CancelToken::never()).await,
            Err(CompressError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_quick_moves_past_failing_format() {
        let caps = FormatCapabilities::with_avif(false);
        let registry = CodecRegistry::new(&caps).with_codec(Arc::new(FailingCodec(OutputFormat::Jpeg)));
        let engine = CompressionEngine::with_parts(Config::default(), caps, registry);

        let job = CompressionJob::quick(Arc::new(photo_image(96, 96)), 10_000_000)
            .with_allowed_formats(CORE.to_vec());
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();

        assert_eq!(report.candidate.format, OutputFormat::WebP);
        assert_eq!(report.attempted[0].format, OutputFormat::Jpeg);
        assert!(report.attempted[0].error.is_some());
        assert!(report.constraints_met());
    }

    #[tokio::test]
    async fn test_quick_approximate_fit_is_flagged() {
        let caps = FormatCapabilities::with_avif(false);
        let registry = CodecRegistry::empty().with_codec(Arc::new(LinearCodec));
        let target = LinearCodec::size_for(100) as u64 - 1;

        let tight = Config {
            max_iterations: 2,
            size_tolerance: 0.001,
            ..Config::default()
        };
        let engine = CompressionEngine::with_parts(tight, caps, registry.clone());
        let job = CompressionJob::quick(Arc::new(photo_image(8, 8)), target)
            .with_allowed_formats(vec![OutputFormat::Jpeg]);
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();
        assert_eq!(report.search_status, Some(SearchStatus::Approximate));
        assert!(report.candidate.size_bytes <= target);
        assert!(!report.constraints_met());
        assert!(report.message().contains("approximate"));

        // with enough budget the same target ends one quality step below it
        let roomy = Config {
            size_tolerance: 0.001,
            ..Config::default()
        };
        let engine = CompressionEngine::with_parts(roomy, caps, registry);
        let job = CompressionJob::quick(Arc::new(photo_image(8, 8)), target)
            .with_allowed_formats(vec![OutputFormat::Jpeg]);
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();
        assert_eq!(report.search_status, Some(SearchStatus::Bracketed));
        assert_eq!(report.candidate.profile.quality, 99);
        assert!(report.constraints_met());
    }

    #[tokio::test]
    async fn test_missed_target_suggests_other_format() {
        let engine = engine(Config::default());
        let profile = EncodingProfile::new(OutputFormat::Jpeg).with_quality(80);
        let job = CompressionJob::advanced(Arc::new(photo_image(128, 128)), profile).with_target(100);
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();

        assert!(!report.target_met);
        let suggestion = report.suggested_format.unwrap();
        assert_ne!(suggestion.format, OutputFormat::Jpeg);
        assert!(!suggestion.achieves_target);

        let job = CompressionJob::advanced(Arc::new(photo_image(64, 64)), profile).with_target(10_000_000);
        let report = engine.compress(job, &CancelToken::never()).await.unwrap();
        assert!(report.suggested_format.is_none());
    }

    #[tokio::test]
    async fn test_encode_slots_follow_workers() {
        let engine = engine(Config {
            workers: 3,
            ..Config::default()
        });
        assert_eq!(engine.encode_slots.available_permits(), 3);
    }

    #[tokio::test]
    async fn test_preview_and_compare() {
        let engine = engine(Config::default());
        let source = Arc::new(photo_image(128, 128));
        let estimate = engine
            .preview(Arc::clone(&source), EncodingProfile::new(OutputFormat::WebP))
            .await
            .unwrap();
        assert!(estimate.estimated_bytes > 0);

        let all = engine.compare_formats(source, 80).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
