//! # Optimizer Module
//!
//! Orchestrazione dei job di compressione, divisa in sottomoduli:
//! - `job`: Richiesta (`CompressionJob`) e risultato (`JobReport`)
//! - `cancel`: Segnale di stop cooperativo
//! - `quick`: Modalità Quick (advisor + ricerca per formato in parallelo)
//! - `advanced`: Modalità Advanced (un solo encode col profilo dato)
//! - `preview`: Stima veloce delle dimensioni
//! - `engine`: Punto di ingresso e dispatch
//! - `batch`: Più job in parallelo con concorrenza limitata

pub mod advanced;
pub mod batch;
pub mod cancel;
pub mod engine;
pub mod job;
pub mod preview;
pub mod quick;

pub use batch::{BatchItem, BatchOutcome, BatchRunner};
pub use cancel::{CancelHandle, CancelToken};
pub use engine::CompressionEngine;
pub use job::{CompressionJob, JobMode, JobReport};
pub use preview::{EstimateMethod, FormatSuggestion, SizeEstimate};
