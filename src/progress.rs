//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche dei batch.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche di compressione (job completati, target mancati, errori)
//! - Calcolo percentuali di riduzione e byte risparmiati
//!
//! ## Componenti principali:
//! - `ProgressManager`: Gestisce la progress bar (nascosta in modalità JSON)
//! - `BatchStats`: Traccia statistiche cumulative
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 9/15 (60%) ✅ photo.jpg: JPEG q84 4:2:0
//! ```

use crate::file_manager::FileManager;
use crate::optimizer::job::JobReport;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Progress bar over the jobs of a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; hidden when output is machine-readable
    pub fn new(total_jobs: u64, hidden: bool) -> Self {
        if hidden {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_jobs);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Advance by one finished job
    pub fn job_done(&self, name: &str, report: Option<&JobReport>) {
        self.bar.inc(1);
        let message = match report {
            Some(r) if r.constraints_met() => format!("✅ {}: {}", name, r.candidate.profile),
            Some(r) => format!("⚠️  {}: {}", name, r.candidate.profile),
            None => format!("❌ {}", name),
        };
        self.bar.set_message(message);
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics tracker for a batch of jobs
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchStats {
    pub jobs_processed: usize,
    pub constraints_met: usize,
    pub constraints_missed: usize,
    pub errors: usize,
    pub cancelled: usize,
    pub total_original_size: u64,
    pub total_output_size: u64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_report(&mut self, original_size: u64, report: &JobReport) {
        self.jobs_processed += 1;
        if report.constraints_met() {
            self.constraints_met += 1;
        } else {
            self.constraints_missed += 1;
        }
        self.total_original_size += original_size;
        self.total_output_size += report.candidate.size_bytes;
    }

    pub fn add_error(&mut self) {
        self.jobs_processed += 1;
        self.errors += 1;
    }

    pub fn add_cancelled(&mut self) {
        self.jobs_processed += 1;
        self.cancelled += 1;
    }

    pub fn bytes_saved(&self) -> u64 {
        self.total_original_size.saturating_sub(self.total_output_size)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.total_original_size, self.total_output_size)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} | Met: {} | Missed: {} | Errors: {} | Cancelled: {} | Saved: {} ({:.2}%)",
            self.jobs_processed,
            self.constraints_met,
            self.constraints_missed,
            self.errors,
            self.cancelled,
            FileManager::format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = BatchStats::new();
        stats.add_error();
        stats.add_cancelled();
        assert_eq!(stats.jobs_processed, 2);
        assert_eq!(stats.bytes_saved(), 0);
        assert_eq!(stats.overall_reduction_percent(), 0.0);
        assert!(stats.format_summary().contains("Errors: 1"));
    }
}
