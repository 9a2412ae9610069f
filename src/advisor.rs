//! # Format Advisor Module
//!
//! Ordina i formati candidati in base al contenuto dell'immagine.
//!
//! ## Responsabilità:
//! - Regole fisse e deterministiche (nessun modello appreso)
//! - Contenuto grafico o con trasparenza: PNG / WebP lossless prima di JPEG
//! - Contenuto fotografico: MozJPEG / WebP / AVIF prima di PNG
//! - AVIF proposto solo se `FormatCapabilities` lo riporta disponibile
//! - Raccomandazione per caso d'uso (web, social, archivio, ...)
//!
//! ## Ordinamenti:
//! | Contenuto            | Ranking                                        |
//! |----------------------|------------------------------------------------|
//! | grafico + alpha      | PNG, WebP lossless                             |
//! | grafico opaco        | PNG, WebP lossless, WebP, JPEG, AVIF           |
//! | fotografico + alpha  | WebP, AVIF, PNG, WebP lossless                 |
//! | fotografico opaco    | JPEG, WebP, AVIF, PNG                          |
//!
//! La classifica è solo consultiva in modalità Quick; la modalità Advanced la ignora.

use crate::capabilities::FormatCapabilities;
use crate::profile::{EncodingProfile, OutputFormat};
use crate::source::{ContentClass, SourceImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A ranked format plus the lossless flag it should be tried with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FormatChoice {
    pub format: OutputFormat,
    pub lossless: bool,
}

impl FormatChoice {
    pub fn lossy(format: OutputFormat) -> Self {
        Self {
            format,
            lossless: format == OutputFormat::Png,
        }
    }

    pub fn lossless(format: OutputFormat) -> Self {
        Self { format, lossless: true }
    }

    /// Starting profile the search moves along
    pub fn base_profile(&self, effort: u8) -> EncodingProfile {
        EncodingProfile::new(self.format)
            .with_lossless(self.lossless)
            .with_effort(effort)
    }
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lossless && self.format != OutputFormat::Png {
            write!(f, "{} lossless", self.format)
        } else {
            write!(f, "{}", self.format)
        }
    }
}

/// Rank the allowed formats for this source, most recommended first
pub fn advise(
    source: &SourceImage,
    allowed: &[OutputFormat],
    capabilities: &FormatCapabilities,
) -> Vec<FormatChoice> {
    use OutputFormat::*;

    let ranking: Vec<FormatChoice> = match (source.content(), source.has_alpha()) {
        (ContentClass::Graphic, true) => vec![FormatChoice::lossy(Png), FormatChoice::lossless(WebP)],
        (ContentClass::Graphic, false) => vec![
            FormatChoice::lossy(Png),
            FormatChoice::lossless(WebP),
            FormatChoice::lossy(WebP),
            FormatChoice::lossy(Jpeg),
            FormatChoice::lossy(Avif),
        ],
        (ContentClass::Photographic, true) => vec![
            FormatChoice::lossy(WebP),
            FormatChoice::lossy(Avif),
            FormatChoice::lossy(Png),
            FormatChoice::lossless(WebP),
        ],
        (ContentClass::Photographic, false) => vec![
            FormatChoice::lossy(Jpeg),
            FormatChoice::lossy(WebP),
            FormatChoice::lossy(Avif),
            FormatChoice::lossy(Png),
        ],
    };

    let ranked: Vec<FormatChoice> = ranking
        .into_iter()
        .filter(|choice| allowed.contains(&choice.format))
        .filter(|choice| {
            let available = capabilities.is_available(choice.format);
            if !available {
                debug!("{} not available, dropped from ranking", choice.format);
            }
            available
        })
        .collect();

    debug!(
        "Advisor ranking for {:?} content (alpha={}): [{}]",
        source.content(),
        source.has_alpha(),
        ranked.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
    );
    ranked
}

/// Target usage of the compressed image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    Web,
    Social,
    Archive,
    Universal,
    Smallest,
}

impl FromStr for UseCase {
    type Err = crate::error::CompressError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "web" => Ok(UseCase::Web),
            "social" => Ok(UseCase::Social),
            "archive" => Ok(UseCase::Archive),
            "universal" => Ok(UseCase::Universal),
            "smallest" => Ok(UseCase::Smallest),
            other => Err(crate::error::CompressError::Validation(format!("Unknown use case: {}", other))),
        }
    }
}

/// Single recommended format for a use case
pub fn recommend_for_use_case(use_case: UseCase, has_alpha: bool, capabilities: &FormatCapabilities) -> OutputFormat {
    let modern = if capabilities.is_available(OutputFormat::Avif) {
        OutputFormat::Avif
    } else {
        OutputFormat::WebP
    };

    match use_case {
        // lossless even with alpha: the modern formats here would be lossy
        UseCase::Archive => OutputFormat::Png,
        _ if has_alpha => modern,
        UseCase::Web | UseCase::Smallest => modern,
        UseCase::Social | UseCase::Universal => OutputFormat::Jpeg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{logo_image, photo_image};

    const CORE: [OutputFormat; 3] = [OutputFormat::Jpeg, OutputFormat::WebP, OutputFormat::Png];

    #[test]
    fn test_photo_prefers_lossy() {
        let ranked = advise(&photo_image(200, 150), &CORE, &FormatCapabilities::with_avif(false));
        assert_eq!(ranked[0], FormatChoice::lossy(OutputFormat::Jpeg));
        assert_eq!(ranked[1], FormatChoice::lossy(OutputFormat::WebP));
        assert_eq!(ranked.last().map(|c| c.format), Some(OutputFormat::Png));
    }

    #[test]
    fn test_transparent_logo_is_lossless_only() {
        let ranked = advise(&logo_image(128, 128), &CORE, &FormatCapabilities::with_avif(false));
        assert_eq!(
            ranked,
            vec![FormatChoice::lossy(OutputFormat::Png), FormatChoice::lossless(OutputFormat::WebP)]
        );
        assert!(ranked.iter().all(|c| c.format != OutputFormat::Jpeg));
    }

    #[test]
    fn test_avif_never_ranked_when_unavailable() {
        let all = OutputFormat::ALL;
        let caps = FormatCapabilities::with_avif(false);
        for source in [photo_image(120, 90), logo_image(64, 64)] {
            assert!(advise(&source, &all, &caps).iter().all(|c| c.format != OutputFormat::Avif));
        }
    }

    #[test]
    fn test_allowed_filter() {
        let ranked = advise(
            &photo_image(100, 100),
            &[OutputFormat::Png],
            &FormatCapabilities::with_avif(false),
        );
        assert_eq!(ranked, vec![FormatChoice::lossy(OutputFormat::Png)]);
    }

    #[test]
    fn test_use_case_recommendation() {
        let caps = FormatCapabilities::with_avif(false);
        assert_eq!(recommend_for_use_case(UseCase::Social, false, &caps), OutputFormat::Jpeg);
        assert_eq!(recommend_for_use_case(UseCase::Archive, true, &caps), OutputFormat::Png);
        assert_eq!(recommend_for_use_case(UseCase::Web, false, &caps), OutputFormat::WebP);
        assert_eq!(recommend_for_use_case(UseCase::Universal, true, &caps), OutputFormat::WebP);
        assert_eq!("smallest".parse::<UseCase>().unwrap(), UseCase::Smallest);
    }
}
