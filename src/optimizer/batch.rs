//! # Batch Runner
//!
//! Esegue più job di compressione in parallelo con concorrenza limitata.
//!
//! ## Responsabilità:
//! - Classificazione dei job per dimensione della sorgente (megapixel, letti dall'header)
//! - Decodifica della sorgente solo dopo aver ottenuto il permesso
//! - Semafori per classe: piccoli = tutti i worker, medi = metà, grandi = uno
//! - Propagazione della cancellazione a tutti i job in volo
//! - Raccolta dei risultati nell'ordine di input e aggiornamento di `BatchStats`
//!
//! Il permesso viene acquisito PRIMA dello spawn: il loop di dispatch si ferma
//! quando la classe è satura, e i buffer RGBA in memoria restano limitati ai
//! job in volo.

use super::cancel::CancelToken;
use super::engine::CompressionEngine;
use super::job::{CompressionJob, JobReport};
use crate::error::{CompressError, Result};
use crate::progress::{BatchStats, ProgressManager};
use crate::source::SourceImage;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Source size classes for concurrency control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// < 4 MP
    Small,
    /// 4-16 MP
    Medium,
    /// > 16 MP
    Large,
}

impl SizeClass {
    const SMALL_THRESHOLD: u64 = 4_000_000;
    const LARGE_THRESHOLD: u64 = 16_000_000;

    pub fn classify(pixel_count: u64) -> Self {
        if pixel_count < Self::SMALL_THRESHOLD {
            SizeClass::Small
        } else if pixel_count <= Self::LARGE_THRESHOLD {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SizeClass::Small => "small (<4MP)",
            SizeClass::Medium => "medium (4-16MP)",
            SizeClass::Large => "large (>16MP)",
        }
    }
}

/// One semaphore per size class
struct ConcurrencyManager {
    small: Arc<Semaphore>,
    medium: Arc<Semaphore>,
    large: Arc<Semaphore>,
}

impl ConcurrencyManager {
    fn new(max_workers: usize) -> Self {
        let small_workers = max_workers.max(1);
        let medium_workers = (max_workers / 2).max(1);

        debug!(
            "Batch concurrency: small={} medium={} large=1",
            small_workers, medium_workers
        );

        Self {
            small: Arc::new(Semaphore::new(small_workers)),
            medium: Arc::new(Semaphore::new(medium_workers)),
            large: Arc::new(Semaphore::new(1)),
        }
    }

    async fn acquire(&self, class: SizeClass) -> Result<OwnedSemaphorePermit> {
        let semaphore = match class {
            SizeClass::Small => &self.small,
            SizeClass::Medium => &self.medium,
            SizeClass::Large => &self.large,
        };
        semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CompressError::Validation(format!("concurrency limiter closed: {}", e)))
    }
}

type JobLoader = Box<dyn FnOnce() -> Result<CompressionJob> + Send>;

/// A deferred job plus the bookkeeping the caller wants back
pub struct BatchItem {
    pub name: String,
    pub original_size: u64,
    pub dimensions: (u32, u32),
    load: JobLoader,
}

impl BatchItem {
    /// Wrap a job whose source is already decoded
    pub fn from_job(name: impl Into<String>, original_size: u64, job: CompressionJob) -> Self {
        Self {
            name: name.into(),
            original_size,
            dimensions: job.source.dimensions(),
            load: Box::new(move || Ok(job)),
        }
    }

    /// Read only the header now; the file is decoded and `build` runs once a worker is free
    pub fn from_file<F>(path: &Path, build: F) -> Result<Self>
    where
        F: FnOnce(SourceImage) -> Result<CompressionJob> + Send + 'static,
    {
        let original_size = std::fs::metadata(path)?.len();
        let dimensions = image::image_dimensions(path).map_err(CompressError::Decode)?;
        let owned = path.to_path_buf();
        Ok(Self {
            name: path.display().to_string(),
            original_size,
            dimensions,
            load: Box::new(move || {
                let bytes = std::fs::read(&owned)?;
                build(SourceImage::decode(&bytes)?)
            }),
        })
    }

    pub fn pixel_count(&self) -> u64 {
        self.dimensions.0 as u64 * self.dimensions.1 as u64
    }
}

/// Result of one batch item, in input order
pub struct BatchOutcome {
    pub name: String,
    pub original_size: u64,
    pub result: Result<JobReport>,
}

/// Runs jobs through one engine with size-aware concurrency
pub struct BatchRunner {
    engine: CompressionEngine,
    concurrency: ConcurrencyManager,
    progress: Option<ProgressManager>,
}

impl BatchRunner {
    pub fn new(engine: CompressionEngine) -> Self {
        let concurrency = ConcurrencyManager::new(engine.config().workers);
        Self {
            engine,
            concurrency,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressManager) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every item; jobs not started before cancellation report `Cancelled`
    pub async fn run(&self, items: Vec<BatchItem>, cancel: &CancelToken) -> (Vec<BatchOutcome>, BatchStats) {
        let total = items.len();
        let mut pending = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            if cancel.should_stop() {
                pending.push((item.name, item.original_size, None));
                continue;
            }

            let class = SizeClass::classify(item.pixel_count());
            debug!("[{}/{}] {} classified as {}", index + 1, total, item.name, class.description());

            let permit = match self.concurrency.acquire(class).await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Failed to acquire permit for {}: {}", item.name, e);
                    pending.push((item.name, item.original_size, None));
                    continue;
                }
            };

            let engine = self.engine.clone();
            let token = cancel.clone();
            let load = item.load;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let job = tokio::task::spawn_blocking(load)
                    .await
                    .map_err(|e| CompressError::Validation(format!("source loader failed: {}", e)))??;
                engine.compress(job, &token).await
            });
            pending.push((item.name, item.original_size, Some(handle)));
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut stats = BatchStats::new();

        for (name, original_size, handle) in pending {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(CompressError::Validation(format!("job task failed: {}", e))),
                },
                None => Err(CompressError::Cancelled),
            };

            match &result {
                Ok(report) => stats.add_report(original_size, report),
                Err(CompressError::Cancelled) => stats.add_cancelled(),
                Err(e) => {
                    warn!("❌ {}: {}", name, e);
                    stats.add_error();
                }
            }
            if let Some(progress) = &self.progress {
                progress.job_done(&name, result.as_ref().ok());
            }

            outcomes.push(BatchOutcome {
                name,
                original_size,
                result,
            });
        }

        info!("📊 {}", stats.format_summary());
        (outcomes, stats)
    }
}
