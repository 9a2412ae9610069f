//! # Quality Scorer Module
//!
//! Calcola la structural similarity tra sorgente e candidato decodificato.
//!
//! ## Responsabilità:
//! - Porta entrambe le immagini nello stesso spazio (RGB, alpha composto su bianco)
//! - Misura multi-scala con `dssim-core`, riportata in [0, 1] come SSIM
//! - Short-circuit lossless: PNG e WebP lossless valgono 1.0 senza decodifica
//! - Formati senza decoder compilato restano senza score (`None`)
//!
//! ## Scala:
//! `dssim-core` restituisce DSSIM = 1/SSIM - 1 (0 = identiche). Il punteggio è
//! `1 / (1 + DSSIM)`, cioè di nuovo SSIM: 1.0 identiche, verso 0 più diverse.
//!
//! ## Costo:
//! O(pixel). È il motivo per cui la ricerca valuta solo il candidato finale.

use crate::candidate::CandidateResult;
use crate::codecs::Codec;
use crate::error::{CompressError, Result};
use crate::source::{composite_over_white, SourceImage};
use dssim_core::{Dssim, DssimImage};
use image::RgbaImage;
use rgb::RGB8;
use tracing::debug;

/// Score a candidate against its source.
///
/// Lossless profiles return `Some(1.0)` without touching the encoded bytes.
/// Returns `None` when the codec has no decoder.
pub fn score(source: &SourceImage, candidate: &CandidateResult, codec: &dyn Codec) -> Result<Option<f64>> {
    if candidate.profile.is_lossless() {
        debug!("{} is lossless, SSIM pinned to 1.0", candidate.profile);
        return Ok(Some(1.0));
    }

    let Some(decoded) = codec.decode(&candidate.data)? else {
        debug!("No {} decoder, candidate left unscored", candidate.format);
        return Ok(None);
    };

    let value = ssim(source.rgba(), &decoded)?;
    debug!("SSIM {} = {:.4}", candidate.profile, value);
    Ok(Some(value))
}

/// Score and record the result on the candidate
pub fn score_candidate(
    source: &SourceImage,
    candidate: CandidateResult,
    codec: &dyn Codec,
    quality_floor: f64,
) -> Result<CandidateResult> {
    let value = score(source, &candidate, codec)?;
    Ok(candidate.with_score(value, quality_floor))
}

/// Structural similarity of two equally sized images, in [0, 1]
pub fn ssim(original: &RgbaImage, candidate: &RgbaImage) -> Result<f64> {
    if original.dimensions() != candidate.dimensions() {
        return Err(CompressError::Validation(format!(
            "SSIM needs equal dimensions, got {:?} and {:?}",
            original.dimensions(),
            candidate.dimensions()
        )));
    }
    if original.width() == 0 || original.height() == 0 {
        return Ok(1.0);
    }

    let attr = Dssim::new();
    let a = dssim_image(&attr, original)?;
    let b = dssim_image(&attr, candidate)?;
    let (dssim, _) = attr.compare(&a, b);
    let dssim: f64 = dssim.into();

    Ok((1.0 / (1.0 + dssim.max(0.0))).clamp(0.0, 1.0))
}

fn dssim_image(attr: &Dssim, image: &RgbaImage) -> Result<DssimImage<f32>> {
    let pixels: Vec<RGB8> = image
        .pixels()
        .map(|p| {
            let [r, g, b] = composite_over_white(p.0);
            RGB8::new(r, g, b)
        })
        .collect();
    attr.create_image_rgb(&pixels, image.width() as usize, image.height() as usize)
        .ok_or_else(|| {
            CompressError::Validation(format!(
                "cannot build a {}x{} image for scoring",
                image.width(),
                image.height()
            ))
        })
}
