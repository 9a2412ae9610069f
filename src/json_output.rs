//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico della CLI.
//!
//! ## Responsabilità:
//! - Emette una riga JSON per evento su stdout
//! - Riusa `JobReport`, `SizeEstimate` e `BatchStats` come payload
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch
//! - `job_start`: Inizio elaborazione di un'immagine
//! - `job_complete`: Fine elaborazione con il report del job
//! - `preview`: Stime di dimensione per uno o più formati
//! - `complete`: Fine del batch con statistiche finali
//! - `error`: Errore su un'immagine o sul batch

use crate::config::Config;
use crate::optimizer::job::JobReport;
use crate::optimizer::preview::SizeEstimate;
use crate::progress::BatchStats;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage<'a> {
    #[serde(rename = "start")]
    Start {
        total_jobs: usize,
        mode: &'a str,
        output_dir: Option<PathBuf>,
        config: &'a Config,
    },

    #[serde(rename = "job_start")]
    JobStart {
        path: PathBuf,
        size: u64,
        width: u32,
        height: u32,
        index: usize,
        total: usize,
    },

    #[serde(rename = "job_complete")]
    JobComplete {
        path: PathBuf,
        output: Option<PathBuf>,
        original_size: u64,
        reduction_percent: f64,
        report: &'a JobReport,
    },

    #[serde(rename = "preview")]
    Preview {
        path: PathBuf,
        estimates: &'a [SizeEstimate],
    },

    #[serde(rename = "complete")]
    Complete {
        stats: &'a BatchStats,
        duration_seconds: f64,
    },

    #[serde(rename = "error")]
    Error {
        path: Option<PathBuf>,
        message: String,
    },
}

impl JsonMessage<'_> {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Error {
            path,
            message: message.into(),
        }
    }
}
