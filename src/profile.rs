//! # Encoding Profile Module
//!
//! Questo modulo definisce i formati di output e i profili di encoding.
//!
//! ## Responsabilità:
//! - `OutputFormat`: i quattro formati supportati (JPEG, PNG, WebP, AVIF)
//! - `ChromaSubsampling`: 4:4:4, 4:2:2, 4:2:0
//! - `EncodingProfile`: value object immutabile con tutti i parametri regolabili
//! - Validazione della legalità di un profilo per ciascun formato
//!
//! ## Regole di legalità:
//! | Formato | Lossy | Lossless | Chroma            | Progressive |
//! |---------|-------|----------|-------------------|-------------|
//! | JPEG    | ✅    | ❌       | 4:4:4/4:2:2/4:2:0 | ✅          |
//! | PNG     | ❌    | ✅       | ignorato          | ❌          |
//! | WebP    | ✅    | ✅       | solo 4:2:0 (lossy)| ❌          |
//! | AVIF    | ✅    | ❌       | ignorato          | ❌          |
//!
//! ## Esempio:
//! ```rust,ignore
//! let profile = EncodingProfile::new(OutputFormat::Jpeg)
//!     .with_quality(80)
//!     .with_chroma(ChromaSubsampling::Cs420)
//!     .with_progressive(true);
//! profile.validate()?;
//! ```

use crate::error::{CompressError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output formats the engine can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::WebP,
        OutputFormat::Avif,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn supports_transparency(&self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }

    /// Short description shown next to size estimates
    pub fn description(&self) -> &'static str {
        match self {
            OutputFormat::Avif => "Best compression, modern browsers",
            OutputFormat::WebP => "Good compression, wide support",
            OutputFormat::Jpeg => "Universal compatibility",
            OutputFormat::Png => "Lossless, large files",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::WebP => "WebP",
            OutputFormat::Avif => "AVIF",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jpg" | "jpeg" | "mozjpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(CompressError::Validation(format!("Unknown output format: {}", other))),
        }
    }
}

/// Chroma subsampling modes for lossy formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    /// Full color resolution
    #[serde(rename = "4:4:4")]
    Cs444,
    /// Half horizontal color resolution
    #[serde(rename = "4:2:2")]
    Cs422,
    /// Half horizontal and vertical color resolution
    #[default]
    #[serde(rename = "4:2:0")]
    Cs420,
}

impl ChromaSubsampling {
    /// Chroma sample sizes in pixels (horizontal, vertical)
    pub fn pixel_sizes(&self) -> (u8, u8) {
        match self {
            ChromaSubsampling::Cs444 => (1, 1),
            ChromaSubsampling::Cs422 => (2, 1),
            ChromaSubsampling::Cs420 => (2, 2),
        }
    }
}

impl fmt::Display for ChromaSubsampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChromaSubsampling::Cs444 => "4:4:4",
            ChromaSubsampling::Cs422 => "4:2:2",
            ChromaSubsampling::Cs420 => "4:2:0",
        };
        f.write_str(label)
    }
}

impl FromStr for ChromaSubsampling {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "444" | "4:4:4" => Ok(ChromaSubsampling::Cs444),
            "422" | "4:2:2" => Ok(ChromaSubsampling::Cs422),
            "420" | "4:2:0" => Ok(ChromaSubsampling::Cs420),
            other => Err(CompressError::Validation(format!("Unknown chroma subsampling: {}", other))),
        }
    }
}

/// Maximum encoder effort accepted by every format
pub const MAX_EFFORT: u8 = 10;

/// Tunable encoding parameters for one encode attempt.
///
/// Values are immutable once built: the builder methods return a new profile.
/// Format-specific legality is checked by [`EncodingProfile::validate`], which
/// every codec adapter runs before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub format: OutputFormat,
    /// Quality 1-100, ignored by lossless encodes
    pub quality: u8,
    pub chroma: ChromaSubsampling,
    pub progressive: bool,
    /// Encoder effort 0-10, higher = slower and smaller
    pub effort: u8,
    pub lossless: bool,
}

impl EncodingProfile {
    /// Default profile for a format: lossless for PNG, quality 85 otherwise
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            quality: 85,
            chroma: ChromaSubsampling::Cs420,
            progressive: false,
            effort: 4,
            lossless: format == OutputFormat::Png,
        }
    }

    pub fn with_quality(self, quality: u8) -> Self {
        Self { quality, ..self }
    }

    pub fn with_chroma(self, chroma: ChromaSubsampling) -> Self {
        Self { chroma, ..self }
    }

    pub fn with_progressive(self, progressive: bool) -> Self {
        Self { progressive, ..self }
    }

    pub fn with_effort(self, effort: u8) -> Self {
        Self { effort, ..self }
    }

    pub fn with_lossless(self, lossless: bool) -> Self {
        Self { lossless, ..self }
    }

    /// True when the encode cannot lose information
    pub fn is_lossless(&self) -> bool {
        self.format == OutputFormat::Png || (self.format == OutputFormat::WebP && self.lossless)
    }

    /// Whether the size search has a quality axis to move along
    pub fn has_quality_axis(&self) -> bool {
        !self.is_lossless()
    }

    /// Check the profile against the legality rules of its format
    pub fn validate(&self) -> Result<()> {
        if self.effort > MAX_EFFORT {
            return Err(CompressError::unsupported(
                self.format,
                format!("effort must be 0-{}, got {}", MAX_EFFORT, self.effort),
            ));
        }

        if !self.is_lossless() && (self.quality == 0 || self.quality > 100) {
            return Err(CompressError::unsupported(
                self.format,
                format!("quality must be 1-100, got {}", self.quality),
            ));
        }

        if self.progressive && self.format != OutputFormat::Jpeg {
            return Err(CompressError::unsupported(self.format, "progressive encoding is JPEG only"));
        }

        match self.format {
            OutputFormat::Jpeg if self.lossless => {
                Err(CompressError::unsupported(self.format, "JPEG has no lossless mode"))
            }
            OutputFormat::Png if !self.lossless => {
                Err(CompressError::unsupported(self.format, "PNG is lossless only"))
            }
            OutputFormat::WebP if !self.lossless && self.chroma != ChromaSubsampling::Cs420 => {
                Err(CompressError::unsupported(
                    self.format,
                    format!("lossy WebP is always 4:2:0, got {}", self.chroma),
                ))
            }
            // ravif has no lossless mode and q100 is still lossy
            OutputFormat::Avif if self.lossless => {
                Err(CompressError::unsupported(self.format, "AVIF lossless is not supported"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_lossless() {
            write!(f, "{} lossless (effort {})", self.format, self.effort)
        } else {
            write!(f, "{} q{} {}", self.format, self.quality, self.chroma)?;
            if self.progressive {
                f.write_str(" progressive")?;
            }
            Ok(())
        }
    }
}
