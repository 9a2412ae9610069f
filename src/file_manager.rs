//! # File Management Module
//!
//! Operazioni sui file per la CLI: il motore lavora solo in memoria.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva delle immagini in input (file e directory)
//! - Lettura e decodifica della sorgente
//! - Calcolo del path di output e scrittura atomica (file temporaneo + rename)
//! - Formattazione e parsing human-readable delle dimensioni
//!
//! ## Formati in input:
//! JPG, JPEG, PNG, WebP
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_image_files(&[PathBuf::from("photos")])?;
//! for file in files {
//!     let (size, source) = FileManager::read_source(&file).await?;
//! }
//! ```

use crate::profile::OutputFormat;
use crate::source::SourceImage;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// File operations for the CLI front end
pub struct FileManager;

impl FileManager {
    /// Expand inputs: files are kept if supported, directories are walked recursively
    pub fn find_image_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_dir() {
                for entry in WalkDir::new(input)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    if Self::is_supported_input(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else if input.is_file() {
                if !Self::is_supported_input(input) {
                    anyhow::bail!("Unsupported input format: {}", input.display());
                }
                files.push(input.clone());
            } else {
                anyhow::bail!("Input does not exist: {}", input.display());
            }
        }

        Ok(files)
    }

    /// Check if a file can be decoded as a source
    pub fn is_supported_input(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "jpg" | "jpeg" | "png" | "webp")
        } else {
            false
        }
    }

    /// Read and decode a source image, returning its file size too
    pub async fn read_source(path: &Path) -> Result<(u64, SourceImage)> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let size = bytes.len() as u64;
        let source = tokio::task::spawn_blocking(move || SourceImage::decode(&bytes))
            .await?
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        Ok((size, source))
    }

    /// `<dir>/<stem>.<ext>`; next to the input when no directory is given
    pub fn output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let mut name = format!("{}.{}", stem, format.extension());
        let dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        // never overwrite the input in place
        if output_dir.is_none() && dir.join(&name) == input {
            name = format!("{}.compressed.{}", stem, format.extension());
        }
        dir.join(name)
    }

    /// Write through a temporary file so a failed write never leaves a truncated output
    pub async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Parse `500000`, `500k`, `1.5m` (binary multiples) into bytes
    pub fn parse_size(text: &str) -> Result<u64> {
        let text = text.trim().to_lowercase();
        let text = text.strip_suffix('b').unwrap_or(&text).to_string();
        let (number, multiplier) = match text.char_indices().last() {
            Some((i, 'k')) => (&text[..i], 1024.0),
            Some((i, 'm')) => (&text[..i], 1024.0 * 1024.0),
            Some((i, 'g')) => (&text[..i], 1024.0 * 1024.0 * 1024.0),
            _ => (text.as_str(), 1.0),
        };
        let value: f64 = number
            .trim()
            .parse()
            .with_context(|| format!("Invalid size: {}", text))?;
        if !(value > 0.0) {
            anyhow::bail!("Size must be positive: {}", text);
        }
        Ok((value * multiplier) as u64)
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
