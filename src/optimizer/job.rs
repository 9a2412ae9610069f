//! # Compression Job
//!
//! Richiesta di compressione e report finale.
//!
//! ## Responsabilità:
//! - `CompressionJob`: sorgente + modalità (Quick | Advanced) + floor + formati ammessi
//! - `JobReport`: candidato finale + flag espliciti "target non raggiunto" / floor
//! - Dimensioni e formato alternativo suggeriti quando il target non è raggiungibile

use super::preview::FormatSuggestion;
use crate::candidate::{CandidateResult, FloorStatus};
use crate::profile::{EncodingProfile, OutputFormat};
use crate::search::SearchStatus;
use crate::source::SourceImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Smallest side suggested for a downscale
const MIN_SUGGESTED_SIDE: u32 = 100;

/// Safety margin applied to the area ratio
const SUGGESTED_SCALE_MARGIN: f64 = 0.9;

/// What the caller asks for
#[derive(Debug, Clone, PartialEq)]
pub enum JobMode {
    /// Hit a byte budget, format chosen automatically
    Quick { target_bytes: u64 },
    /// One encode with an explicit profile; the target only sets a flag
    Advanced {
        profile: EncodingProfile,
        target_bytes: Option<u64>,
    },
}

impl JobMode {
    pub fn name(&self) -> &'static str {
        match self {
            JobMode::Quick { .. } => "quick",
            JobMode::Advanced { .. } => "advanced",
        }
    }

    pub fn target_bytes(&self) -> Option<u64> {
        match self {
            JobMode::Quick { target_bytes } => Some(*target_bytes),
            JobMode::Advanced { target_bytes, .. } => *target_bytes,
        }
    }
}

/// One user compression request
#[derive(Debug, Clone)]
pub struct CompressionJob {
    pub source: Arc<SourceImage>,
    pub mode: JobMode,
    pub quality_floor: f64,
    pub allowed_formats: Vec<OutputFormat>,
}

impl CompressionJob {
    pub fn quick(source: Arc<SourceImage>, target_bytes: u64) -> Self {
        Self {
            source,
            mode: JobMode::Quick { target_bytes },
            quality_floor: 0.85,
            allowed_formats: OutputFormat::ALL.to_vec(),
        }
    }

    pub fn advanced(source: Arc<SourceImage>, profile: EncodingProfile) -> Self {
        Self {
            source,
            mode: JobMode::Advanced {
                profile,
                target_bytes: None,
            },
            quality_floor: 0.85,
            allowed_formats: vec![profile.format],
        }
    }

    pub fn with_quality_floor(mut self, quality_floor: f64) -> Self {
        self.quality_floor = quality_floor;
        self
    }

    pub fn with_allowed_formats(mut self, formats: Vec<OutputFormat>) -> Self {
        self.allowed_formats = formats;
        self
    }

    /// Advanced only: record a size goal without searching for it
    pub fn with_target(mut self, target: u64) -> Self {
        match &mut self.mode {
            JobMode::Quick { target_bytes } => *target_bytes = target,
            JobMode::Advanced { target_bytes, .. } => *target_bytes = Some(target),
        }
        self
    }
}

/// One format tried by the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub format: OutputFormat,
    pub lossless: bool,
    pub size_bytes: Option<u64>,
    pub ssim_score: Option<f64>,
    pub status: Option<SearchStatus>,
    pub iterations: u32,
    /// Set when the format failed and was skipped
    pub error: Option<String>,
}

/// Final result of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub candidate: CandidateResult,
    pub mode: &'static str,
    pub target_bytes: Option<u64>,
    pub target_met: bool,
    pub search_status: Option<SearchStatus>,
    pub iterations: u32,
    pub attempted: Vec<AttemptSummary>,
    pub suggested_dimensions: Option<(u32, u32)>,
    /// Another format whose preview fits (or comes closest) when the target is missed
    pub suggested_format: Option<FormatSuggestion>,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl JobReport {
    /// Size target (if any) hit as closely as the search allows, and quality floor satisfied
    pub fn constraints_met(&self) -> bool {
        self.target_met && self.candidate.floor_ok() && self.search_status.map_or(true, |s| s.is_success())
    }

    /// Human-readable outcome
    pub fn message(&self) -> String {
        let size = crate::file_manager::FileManager::format_size(self.candidate.size_bytes);
        let quality = match self.candidate.ssim_score {
            Some(s) => format!("SSIM {:.3}", s),
            None => "SSIM n/a".to_string(),
        };

        let mut message = format!("{} {} ({})", self.candidate.profile, size, quality);
        if !self.target_met {
            if let Some(target) = self.target_bytes {
                message.push_str(&format!(
                    ", target {} not met",
                    crate::file_manager::FileManager::format_size(target)
                ));
            }
            if let Some((w, h)) = self.suggested_dimensions {
                message.push_str(&format!(", try resizing to {}x{}", w, h));
            }
            if let Some(suggestion) = &self.suggested_format {
                message.push_str(&format!(
                    ", {} might reach ~{}",
                    suggestion.format,
                    crate::file_manager::FileManager::format_size(suggestion.estimated_bytes)
                ));
            }
        } else if self.search_status == Some(SearchStatus::Approximate) {
            message.push_str(", approximate fit");
        }
        if self.candidate.floor == FloorStatus::NotMet {
            message.push_str(", below quality floor");
        }
        message
    }
}

fn serialize_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Dimensions that should bring an encode of `size_bytes` under `target_bytes`.
///
/// Scales the area by the size ratio with a 10% margin, clamps each side to
/// 100 px, then rounds down to a multiple of 8.
pub fn suggest_dimensions(width: u32, height: u32, size_bytes: u64, target_bytes: u64) -> Option<(u32, u32)> {
    if size_bytes <= target_bytes || size_bytes == 0 {
        return None;
    }
    let scale = (target_bytes as f64 / size_bytes as f64).sqrt() * SUGGESTED_SCALE_MARGIN;
    let side = |v: u32| {
        let scaled = ((v as f64 * scale) as u32).max(MIN_SUGGESTED_SIDE);
        scaled / 8 * 8
    };
    Some((side(width), side(height)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_dimensions() {
        // a quarter of the bytes -> half the sides, times the margin
        let (w, h) = suggest_dimensions(4000, 3000, 2_000_000, 500_000).unwrap();
        assert_eq!((w, h), (1800, 1344));
        assert_eq!(w % 8, 0);
        assert_eq!(h % 8, 0);
        assert!(suggest_dimensions(4000, 3000, 400_000, 500_000).is_none());
    }

    #[test]
    fn test_suggest_dimensions_minimum_side() {
        let (w, h) = suggest_dimensions(300, 120, 10_000_000, 1_000).unwrap();
        assert_eq!((w, h), (96, 96));
    }

    #[test]
    fn test_mode_target() {
        let mode = JobMode::Quick { target_bytes: 10 };
        assert_eq!(mode.target_bytes(), Some(10));
        assert_eq!(mode.name(), "quick");
    }
}
