//! # Adaptive Image Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare del motore di compressione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `source`: Immagine sorgente decodificata e classificazione del contenuto
//! - `profile`: Formati di output e profili di encoding
//! - `capabilities`: Quali codec sono disponibili in questa build
//! - `codecs`: Adapter per MozJPEG, PNG (oxipng), WebP e AVIF opzionale
//! - `quality`: Punteggio SSIM dei candidati
//! - `advisor`: Ranking dei formati per contenuto e trasparenza
//! - `search`: Ricerca della qualità per un target di dimensione
//! - `optimizer`: Engine, modalità Quick/Advanced, preview, batch
//! - `config`, `error`, `file_manager`, `progress`, `json_output`: ambient e CLI
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use adaptive_image_compressor::{CancelToken, CompressionEngine, CompressionJob, Config, SourceImage};
//!
//! let engine = CompressionEngine::new(Config::default())?;
//! let source = Arc::new(SourceImage::decode(&bytes)?);
//! let report = engine.compress(CompressionJob::quick(source, 500_000), &CancelToken::never()).await?;
//! ```

pub mod advisor;
pub mod candidate;
pub mod capabilities;
pub mod codecs;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod optimizer;
pub mod profile;
pub mod progress;
pub mod quality;
pub mod search;
pub mod source;

#[cfg(test)]
mod test_support;

pub use advisor::{FormatChoice, UseCase};
pub use candidate::{CandidateResult, FloorStatus};
pub use capabilities::FormatCapabilities;
pub use config::Config;
pub use error::{CompressError, Result};
pub use optimizer::{
    BatchItem, BatchRunner, CancelHandle, CancelToken, CompressionEngine, CompressionJob, JobMode, JobReport,
    FormatSuggestion, SizeEstimate,
};
pub use profile::{ChromaSubsampling, EncodingProfile, OutputFormat};
pub use source::{ContentClass, SourceImage};
