//! # Codec Adapters
//!
//! Un adapter per formato, tutti dietro lo stesso contratto `Codec`.
//!
//! ## Responsabilità:
//! - `Codec`: encode puro (stessi input = stessi byte) + decode opzionale per lo scoring
//! - `CodecRegistry`: mappa formato -> adapter, costruita dalle `FormatCapabilities`
//! - `encode_with_retry`: un solo retry con input identici su `EncodeFailed`
//!
//! ## Adapter:
//! - `jpeg`: MozJPEG (Huffman ottimizzato, chroma e progressive configurabili)
//! - `png`: encoder PNG di `image` + ottimizzazione lossless con `oxipng`
//! - `webp`: libwebp (lossy 4:2:0 oppure lossless)
//! - `avif`: ravif/rav1e, solo con la feature cargo `avif`
//!
//! Nessun adapter scrive su filesystem: l'output è sempre un buffer in memoria.

pub mod jpeg;
pub mod png;
pub mod webp;
#[cfg(feature = "avif")]
pub mod avif;

use crate::candidate::CandidateResult;
use crate::capabilities::FormatCapabilities;
use crate::error::{CompressError, Result};
use crate::profile::{EncodingProfile, OutputFormat};
use crate::source::SourceImage;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub use self::jpeg::JpegCodec;
pub use self::png::PngCodec;
pub use self::webp::WebpCodec;
#[cfg(feature = "avif")]
pub use self::avif::AvifCodec;

/// Uniform encode contract shared by every output format
pub trait Codec: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Encode the source with an already validated profile
    fn encode_bytes(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<Vec<u8>>;

    /// Decode an encoded candidate back to RGBA; `None` if no decoder is compiled in
    fn decode(&self, data: &[u8]) -> Result<Option<RgbaImage>>;

    /// Validate the profile, encode, and wrap the bytes in an unscored candidate
    fn encode(&self, source: &SourceImage, profile: &EncodingProfile) -> Result<CandidateResult> {
        if profile.format != self.format() {
            return Err(CompressError::unsupported(
                self.format(),
                format!("profile targets {}", profile.format),
            ));
        }
        profile.validate()?;

        let started = Instant::now();
        let data = self.encode_bytes(source, profile)?;
        debug!(
            "Encoded {}x{} as {} -> {} bytes in {:?}",
            source.width(),
            source.height(),
            profile,
            data.len(),
            started.elapsed()
        );
        Ok(CandidateResult::new(*profile, data))
    }
}

/// Encode, retrying exactly once with identical inputs on `EncodeFailed`
pub fn encode_with_retry(
    codec: &dyn Codec,
    source: &SourceImage,
    profile: &EncodingProfile,
) -> Result<CandidateResult> {
    match codec.encode(source, profile) {
        Err(CompressError::EncodeFailed { reason, .. }) => {
            warn!("⚠️  {} encode failed ({}), retrying once", profile, reason);
            codec.encode(source, profile)
        }
        other => other,
    }
}

/// Adapter lookup by output format
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<OutputFormat, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Register every adapter the capabilities allow
    pub fn new(capabilities: &FormatCapabilities) -> Self {
        let mut registry = Self::empty();
        registry.insert(Arc::new(JpegCodec));
        registry.insert(Arc::new(PngCodec));
        registry.insert(Arc::new(WebpCodec));

        #[cfg(feature = "avif")]
        if capabilities.is_available(OutputFormat::Avif) {
            registry.insert(Arc::new(AvifCodec));
        }
        #[cfg(not(feature = "avif"))]
        let _ = capabilities;

        registry
    }

    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Replace (or add) the adapter for the codec's format
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.insert(codec);
        self
    }

    fn insert(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.format(), codec);
    }

    pub fn get(&self, format: OutputFormat) -> Result<Arc<dyn Codec>> {
        self.codecs
            .get(&format)
            .cloned()
            .ok_or(CompressError::CodecUnavailable(format))
    }

    pub fn contains(&self, format: OutputFormat) -> bool {
        self.codecs.contains_key(&format)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.codecs.keys().collect();
        formats.sort();
        f.debug_struct("CodecRegistry").field("formats", &formats).finish()
    }
}
