//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori del motore di compressione.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per la conversione automatica degli errori standard
//! - Distingue errori fatali per il job da errori limitati a un singolo formato
//!
//! ## Categorie di errori:
//! - `Decode`: Sorgente inutilizzabile, fatale per il job (nessun retry)
//! - `CodecUnavailable`: Codec opzionale non compilato (es. AVIF), escluso in silenzio
//! - `UnsupportedProfile`: Combinazione di parametri illegale per il formato
//! - `EncodeFailed`: Errore dell'encoder, un solo retry con input identici
//! - `Cancelled`: Job interrotto tra due encode o tra due formati
//! - `Validation`: Configurazione o richiesta non valida
//! - `Io`: Errori di I/O (solo glue CLI e config)
//!
//! ## Nota:
//! "Target non raggiunto" NON è un errore: è un flag su `JobReport`.
//!
//! ## Esempio:
//! ```rust,ignore
//! if !capabilities.is_available(OutputFormat::Avif) {
//!     return Err(CompressError::CodecUnavailable(OutputFormat::Avif));
//! }
//! ```

use crate::profile::OutputFormat;

/// Custom error types for image compression
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("Decode error: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Codec unavailable: {0}")]
    CodecUnavailable(OutputFormat),

    #[error("Unsupported {format} profile: {reason}")]
    UnsupportedProfile {
        format: OutputFormat,
        reason: String,
    },

    #[error("{format} encode failed: {reason}")]
    EncodeFailed {
        format: OutputFormat,
        reason: String,
    },

    #[error("Compression job cancelled")]
    Cancelled,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    pub fn unsupported(format: OutputFormat, reason: impl Into<String>) -> Self {
        Self::UnsupportedProfile {
            format,
            reason: reason.into(),
        }
    }

    pub fn encode_failed(format: OutputFormat, reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            format,
            reason: reason.into(),
        }
    }

    /// Errors limited to one format; Quick mode moves on to the next one.
    pub fn is_format_local(&self) -> bool {
        matches!(self, Self::EncodeFailed { .. } | Self::CodecUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_local_errors() {
        assert!(CompressError::encode_failed(OutputFormat::Jpeg, "boom").is_format_local());
        assert!(CompressError::CodecUnavailable(OutputFormat::Avif).is_format_local());
        assert!(!CompressError::Cancelled.is_format_local());
        assert!(!CompressError::unsupported(OutputFormat::Png, "lossy").is_format_local());
    }

    #[test]
    fn test_error_messages() {
        let err = CompressError::unsupported(OutputFormat::Png, "PNG is lossless only");
        assert_eq!(err.to_string(), "Unsupported PNG profile: PNG is lossless only");

        let err = CompressError::CodecUnavailable(OutputFormat::Avif);
        assert_eq!(err.to_string(), "Codec unavailable: AVIF");
    }
}
