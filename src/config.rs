//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione del motore di compressione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `quality_floor`: SSIM minimo accettabile (0.0-1.0, default: 0.85)
//! - `min_quality`: Qualità minima esplorata dalla ricerca (default: 60)
//! - `max_quality`: Qualità massima esplorata dalla ricerca (default: 100)
//! - `max_iterations`: Encode massimi per ricerca (default: 12)
//! - `size_tolerance`: Finestra di convergenza sotto il target (default: 0.05 = 5%)
//! - `workers`: Numero di worker paralleli (default: 4)
//! - `enable_avif`: Usa AVIF se compilato (default: true)
//! - `preview_sample_pixels`: Pixel campionati dall'anteprima (default: 262144)
//! - `default_effort`: Effort encoder 0-10 (default: 4)
//! - `json_output`: Output JSON per uso programmatico (default: false)
//!
//! ## Validazione:
//! - Controlla che quality_floor sia in (0.0, 1.0]
//! - Controlla che 1 <= min_quality <= max_quality <= 100
//! - Controlla che max_iterations sia >= 2
//! - Controlla che size_tolerance sia in (0.0, 0.5]
//! - Controlla che workers sia > 0
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     quality_floor: 0.9,
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::profile::MAX_EFFORT;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the compression engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum acceptable SSIM (0.0-1.0)
    pub quality_floor: f64,
    /// Lowest quality setting the search may try
    pub min_quality: u8,
    /// Highest quality setting the search may try
    pub max_quality: u8,
    /// Encode budget per search
    pub max_iterations: u32,
    /// Fraction of the target below it that still counts as a hit
    pub size_tolerance: f64,
    /// Number of parallel workers (formats within a job, jobs within a batch)
    pub workers: usize,
    /// Use AVIF when the codec is compiled in
    pub enable_avif: bool,
    /// Pixel budget of the size-estimation preview sample
    pub preview_sample_pixels: u32,
    /// Encoder effort 0-10 used when a profile does not set one
    pub default_effort: u8,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality_floor: 0.85,
            min_quality: 60,
            max_quality: 100,
            max_iterations: 12,
            size_tolerance: 0.05,
            workers: 4,
            enable_avif: true,
            preview_sample_pixels: 512 * 512,
            default_effort: 4,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.quality_floor <= 0.0 || self.quality_floor > 1.0 {
            return Err(anyhow::anyhow!("Quality floor must be between 0.0 and 1.0"));
        }

        if self.min_quality == 0 || self.max_quality > 100 {
            return Err(anyhow::anyhow!("Quality range must be within 1-100"));
        }

        if self.min_quality > self.max_quality {
            return Err(anyhow::anyhow!(
                "Minimum quality ({}) exceeds maximum quality ({})",
                self.min_quality,
                self.max_quality
            ));
        }

        if self.max_iterations < 2 {
            return Err(anyhow::anyhow!("Search needs at least 2 iterations"));
        }

        if self.size_tolerance <= 0.0 || self.size_tolerance > 0.5 {
            return Err(anyhow::anyhow!("Size tolerance must be between 0.0 and 0.5"));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.preview_sample_pixels == 0 {
            return Err(anyhow::anyhow!("Preview sample must contain at least one pixel"));
        }

        if self.default_effort > MAX_EFFORT {
            return Err(anyhow::anyhow!("Effort must be between 0 and {}", MAX_EFFORT));
        }

        Ok(())
    }

    /// `<config dir>/image-compressor/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("image-compressor").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
