//! # Adaptive Image Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (file JSON + override da CLI)
//! - Ctrl-C collegato alla cancellazione cooperativa dei job
//! - Lettura delle sorgenti e scrittura dei risultati
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging su stderr (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica la config e applica gli override
//! 4. Espande gli input (file e directory)
//! 5. Preview/compare, oppure batch di job Quick/Advanced
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-compressor photos/ --target 200k --output out/
//! image-compressor logo.png --mode advanced --format webp --lossless
//! image-compressor photo.jpg --compare --quality 80
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use adaptive_image_compressor::advisor::recommend_for_use_case;
use adaptive_image_compressor::file_manager::FileManager;
use adaptive_image_compressor::json_output::JsonMessage;
use adaptive_image_compressor::progress::ProgressManager;
use adaptive_image_compressor::{
    BatchItem, BatchRunner, CancelHandle, ChromaSubsampling, CompressError, CompressionEngine, CompressionJob,
    Config, EncodingProfile, FormatCapabilities, OutputFormat, SourceImage, UseCase,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Pick format and quality automatically to hit a size target
    Quick,
    /// Encode once with an explicit profile
    Advanced,
}

#[derive(Parser)]
#[command(name = "image-compressor")]
#[command(about = "Compress images to a size target with SSIM quality control")]
struct Args {
    /// Image files or directories to compress
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Compression mode
    #[arg(short, long, value_enum, default_value = "quick")]
    mode: Mode,

    /// Size target, e.g. 500000, 200k, 1.5m (required in quick mode)
    #[arg(short, long, value_parser = parse_size)]
    target: Option<u64>,

    /// Minimum acceptable SSIM (0.0-1.0)
    #[arg(long)]
    quality_floor: Option<f64>,

    /// Formats quick mode may choose from, comma separated
    #[arg(long, value_delimiter = ',')]
    allow: Vec<OutputFormat>,

    /// Output format (advanced mode, preview)
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Pick the advanced-mode format from a use case: web, social, archive, universal, smallest
    #[arg(long)]
    use_case: Option<UseCase>,

    /// Quality 1-100 (advanced mode, preview)
    #[arg(short, long, default_value = "85")]
    quality: u8,

    /// Chroma subsampling: 444, 422, 420
    #[arg(long, default_value = "420")]
    chroma: ChromaSubsampling,

    /// Progressive JPEG
    #[arg(long)]
    progressive: bool,

    /// Lossless encode (PNG, WebP)
    #[arg(long)]
    lossless: bool,

    /// Encoder effort 0-10
    #[arg(short, long)]
    effort: Option<u8>,

    /// Only estimate the output size for the chosen profile
    #[arg(long)]
    preview: bool,

    /// Only estimate the output size for every available format
    #[arg(long, conflicts_with = "preview")]
    compare: bool,

    /// Output directory (default: next to each input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Configuration file (default: user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable AVIF even when compiled in
    #[arg(long)]
    no_avif: bool,

    /// Output progress and results as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(text: &str) -> std::result::Result<u64, String> {
    FileManager::parse_size(text).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for JSON lines
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::from_file(&path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(floor) = args.quality_floor {
        config.quality_floor = floor;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(effort) = args.effort {
        config.default_effort = effort;
    }
    if args.no_avif {
        config.enable_avif = false;
    }
    config.json_output = args.json;
    Ok(config)
}

/// Owned per-job settings, applied once a worker has decoded the source
#[derive(Clone)]
struct JobTemplate {
    mode: Mode,
    target: Option<u64>,
    allow: Vec<OutputFormat>,
    quality_floor: f64,
    format: Option<OutputFormat>,
    use_case: Option<UseCase>,
    quality: u8,
    chroma: ChromaSubsampling,
    progressive: bool,
    lossless: bool,
    effort: u8,
    capabilities: FormatCapabilities,
}

impl JobTemplate {
    fn new(args: &Args, engine: &CompressionEngine) -> Self {
        Self {
            mode: args.mode,
            target: args.target,
            allow: args.allow.clone(),
            quality_floor: engine.config().quality_floor,
            format: args.format,
            use_case: args.use_case,
            quality: args.quality,
            chroma: args.chroma,
            progressive: args.progressive,
            lossless: args.lossless,
            effort: engine.config().default_effort,
            capabilities: *engine.capabilities(),
        }
    }

    fn profile(&self, source: &SourceImage) -> Result<EncodingProfile> {
        let format = match (self.format, self.use_case) {
            (Some(format), _) => format,
            (None, Some(use_case)) => recommend_for_use_case(use_case, source.has_alpha(), &self.capabilities),
            (None, None) => anyhow::bail!("--format or --use-case is required"),
        };

        let profile = EncodingProfile::new(format)
            .with_quality(self.quality)
            .with_chroma(self.chroma)
            .with_progressive(self.progressive)
            .with_effort(self.effort)
            .with_lossless(self.lossless || format == OutputFormat::Png);
        profile.validate()?;
        Ok(profile)
    }

    fn build(&self, source: SourceImage) -> Result<CompressionJob> {
        let job = match self.mode {
            Mode::Quick => {
                let mut job = CompressionJob::quick(Arc::new(source), self.target.unwrap_or_default());
                if !self.allow.is_empty() {
                    job = job.with_allowed_formats(self.allow.clone());
                }
                job
            }
            Mode::Advanced => {
                let profile = self.profile(&source)?;
                let mut job = CompressionJob::advanced(Arc::new(source), profile);
                if let Some(target) = self.target {
                    job = job.with_target(target);
                }
                job
            }
        };
        Ok(job.with_quality_floor(self.quality_floor))
    }
}

async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();
    let config = load_config(&args).await?;
    let engine = CompressionEngine::new(config)?;
    let json = args.json;

    if args.mode == Mode::Quick && args.target.is_none() && !args.preview && !args.compare {
        anyhow::bail!("--target is required in quick mode");
    }
    let needs_profile = args.mode == Mode::Advanced || args.preview;
    if needs_profile && args.format.is_none() && args.use_case.is_none() {
        anyhow::bail!("--format or --use-case is required in advanced mode and for --preview");
    }

    if let Some(ref output_dir) = args.output {
        if output_dir.exists() && !output_dir.is_dir() {
            anyhow::bail!("Output path is not a directory: {}", output_dir.display());
        }
    }

    let files = FileManager::find_image_files(&args.inputs)?;
    if files.is_empty() {
        warn!("No images found");
        return Ok(());
    }

    if args.preview || args.compare {
        return run_preview(&args, &engine, &files).await;
    }

    let cancel_handle = Arc::new(CancelHandle::new());
    {
        let handle = cancel_handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 Cancellation requested, stopping after the current encodes");
                handle.cancel();
            }
        });
    }

    let mode_name = match args.mode {
        Mode::Quick => "quick",
        Mode::Advanced => "advanced",
    };
    if json {
        JsonMessage::Start {
            total_jobs: files.len(),
            mode: mode_name,
            output_dir: args.output.clone(),
            config: engine.config(),
        }
        .emit();
    } else {
        info!("🚀 Compressing {} images in {} mode", files.len(), mode_name);
    }

    let template = JobTemplate::new(&args, &engine);
    let mut items = Vec::with_capacity(files.len());
    let mut paths = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        let template = template.clone();
        let item = match BatchItem::from_file(path, move |source| {
            template
                .build(source)
                .map_err(|e| CompressError::Validation(format!("{:#}", e)))
        }) {
            Ok(item) => item,
            Err(e) => {
                report_error(json, path, &e.to_string());
                continue;
            }
        };
        if json {
            JsonMessage::JobStart {
                path: path.clone(),
                size: item.original_size,
                width: item.dimensions.0,
                height: item.dimensions.1,
                index: index + 1,
                total: files.len(),
            }
            .emit();
        }
        items.push(item);
        paths.push(path.clone());
    }

    let progress = ProgressManager::new(items.len() as u64, json);
    let runner = BatchRunner::new(engine.clone()).with_progress(progress.clone());
    let (outcomes, stats) = runner.run(items, &cancel_handle.token()).await;
    progress.finish(&stats.format_summary());

    for (path, outcome) in paths.iter().zip(outcomes) {
        let report = match outcome.result {
            Ok(report) => report,
            Err(e) => {
                report_error(json, path, &e.to_string());
                continue;
            }
        };

        let output = FileManager::output_path(path, args.output.as_deref(), report.candidate.format);
        let written = match FileManager::write_output(&output, &report.candidate.data).await {
            Ok(()) => Some(output),
            Err(e) => {
                report_error(json, path, &format!("Failed to write output: {:#}", e));
                None
            }
        };

        let reduction = FileManager::calculate_reduction(outcome.original_size, report.candidate.size_bytes);
        if json {
            JsonMessage::JobComplete {
                path: path.clone(),
                output: written,
                original_size: outcome.original_size,
                reduction_percent: reduction,
                report: &report,
            }
            .emit();
        } else if let Some(output) = written {
            let icon = if report.constraints_met() { "✅" } else { "⚠️ " };
            info!(
                "{} {} -> {}: {} ({:.1}% smaller)",
                icon,
                path.display(),
                output.display(),
                report.message(),
                reduction
            );
        }
    }

    if json {
        JsonMessage::Complete {
            stats: &stats,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        }
        .emit();
    } else {
        info!("🎉 Done in {:.1}s: {}", start_time.elapsed().as_secs_f64(), stats.format_summary());
    }
    Ok(())
}

async fn run_preview(args: &Args, engine: &CompressionEngine, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let source = match FileManager::read_source(path).await {
            Ok((_, source)) => Arc::new(source),
            Err(e) => {
                report_error(args.json, path, &format!("{:#}", e));
                continue;
            }
        };

        let estimates = if args.compare {
            engine.compare_formats(source, args.quality).await?
        } else {
            let profile = JobTemplate::new(args, engine).profile(&source)?;
            vec![engine.preview(source, profile).await?]
        };

        if args.json {
            JsonMessage::Preview {
                path: path.clone(),
                estimates: &estimates,
            }
            .emit();
        } else {
            info!("🔍 {}", path.display());
            for estimate in &estimates {
                info!(
                    "  • {:<28} ~{} ({:?}) - {}",
                    estimate.profile.to_string(),
                    FileManager::format_size(estimate.estimated_bytes),
                    estimate.method,
                    estimate.description
                );
            }
        }
    }
    Ok(())
}

fn report_error(json: bool, path: &Path, message: &str) {
    if json {
        JsonMessage::error(Some(path.to_path_buf()), message).emit();
    } else {
        error!("❌ {}: {}", path.display(), message);
    }
}
