//! # Candidate Result Module
//!
//! Output di un singolo tentativo di encoding.
//!
//! ## Responsabilità:
//! - `CandidateResult`: byte codificati, dimensione, profilo usato, SSIM opzionale
//! - `FloorStatus`: esito rispetto al quality floor configurato
//!
//! Un candidato vive solo per la durata del job: la ricerca scarta subito i
//! byte dei tentativi non migliori.

use crate::profile::{EncodingProfile, OutputFormat};
use serde::Serialize;

/// Outcome of a candidate against the configured SSIM floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorStatus {
    /// SSIM computed and at or above the floor
    Met,
    /// SSIM computed and below the floor
    NotMet,
    /// SSIM not computed (not scored yet, or no decoder for the format)
    Unverified,
}

/// One encode attempt
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    pub format: OutputFormat,
    pub profile: EncodingProfile,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub size_bytes: u64,
    pub ssim_score: Option<f64>,
    pub floor: FloorStatus,
}

impl CandidateResult {
    /// Fresh, unscored candidate
    pub fn new(profile: EncodingProfile, data: Vec<u8>) -> Self {
        Self {
            format: profile.format,
            profile,
            size_bytes: data.len() as u64,
            data,
            ssim_score: None,
            floor: FloorStatus::Unverified,
        }
    }

    /// Record an SSIM score and derive the floor status from it
    pub fn with_score(mut self, score: Option<f64>, floor: f64) -> Self {
        self.ssim_score = score;
        self.floor = match score {
            Some(s) if s >= floor => FloorStatus::Met,
            Some(_) => FloorStatus::NotMet,
            None => FloorStatus::Unverified,
        };
        self
    }

    pub fn fits(&self, target_bytes: u64) -> bool {
        self.size_bytes <= target_bytes
    }

    /// Floor satisfied, counting unverifiable candidates as not failing
    pub fn floor_ok(&self) -> bool {
        self.floor != FloorStatus::NotMet
    }
}
