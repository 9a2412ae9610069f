//! # Format Capabilities Module
//!
//! Registro read-only dei codec opzionali disponibili a runtime.
//!
//! ## Responsabilità:
//! - Rileva una sola volta all'avvio quali codec opzionali sono compilati (AVIF)
//! - Combina la disponibilità a compile-time con la configurazione utente
//! - Viene passato esplicitamente ad advisor e orchestratore (niente stato globale)

use crate::config::Config;
use crate::profile::OutputFormat;
use serde::Serialize;
use tracing::debug;

/// Which output formats can actually be encoded in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatCapabilities {
    avif: bool,
}

impl FormatCapabilities {
    /// Detect compiled codecs, honouring `Config::enable_avif`
    pub fn detect(config: &Config) -> Self {
        let compiled = Self::avif_compiled();
        let avif = compiled && config.enable_avif;
        debug!(
            "Format capabilities: AVIF compiled={} enabled={} -> {}",
            compiled, config.enable_avif, avif
        );
        Self { avif }
    }

    /// Capabilities with AVIF forced on or off, clamped to what is compiled
    pub fn with_avif(avif: bool) -> Self {
        Self {
            avif: avif && Self::avif_compiled(),
        }
    }

    pub fn avif_compiled() -> bool {
        cfg!(feature = "avif")
    }

    pub fn is_available(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Avif => self.avif,
            OutputFormat::Jpeg | OutputFormat::Png | OutputFormat::WebP => true,
        }
    }

    pub fn available_formats(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|f| self.is_available(*f))
            .collect()
    }
}

impl Default for FormatCapabilities {
    fn default() -> Self {
        Self::detect(&Config::default())
    }
}
