//! # Quick Mode
//!
//! Target di dimensione con scelta automatica del formato.
//!
//! ## Flusso:
//! 1. L'advisor ordina i formati ammessi per il contenuto della sorgente
//! 2. I formati vengono provati a ondate di `workers` in parallelo
//!    (gli encode di un singolo formato restano sequenziali)
//! 3. Vince il formato meglio classificato che rispetta target e quality floor
//!    con una ricerca conclusa (`Converged`, `Saturated`, `Bracketed`)
//! 4. Se nessuno li rispetta, si restituisce il miglior candidato visto con i
//!    flag "constraints not met"
//!
//! Ogni ricerca occupa uno slot di encode condiviso dall'engine: anche con più
//! job in parallelo gli encode in volo non superano `workers`.
//!
//! Errori limitati a un formato (`EncodeFailed`, `CodecUnavailable`) vengono
//! loggati e saltati; `Cancelled` e `UnsupportedProfile` interrompono il job.

use super::cancel::CancelToken;
use super::job::{suggest_dimensions, AttemptSummary, JobReport};
use crate::advisor::{self, FormatChoice};
use crate::candidate::CandidateResult;
use crate::capabilities::FormatCapabilities;
use crate::codecs::CodecRegistry;
use crate::config::Config;
use crate::error::{CompressError, Result};
use crate::profile::OutputFormat;
use crate::search::{self, SearchOutcome, SearchParams};
use crate::source::SourceImage;
use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Everything Quick mode needs besides the job itself
pub struct QuickContext<'a> {
    pub config: &'a Config,
    pub capabilities: &'a FormatCapabilities,
    pub registry: &'a CodecRegistry,
    /// Engine-wide limit on concurrent searches
    pub encode_slots: &'a Arc<Semaphore>,
}

/// Run Quick mode for one source
pub async fn run(
    ctx: QuickContext<'_>,
    source: Arc<SourceImage>,
    target_bytes: u64,
    quality_floor: f64,
    allowed: &[OutputFormat],
    cancel: &CancelToken,
) -> Result<JobReport> {
    let started = Instant::now();
    let ranked = advisor::advise(&source, allowed, ctx.capabilities);
    if ranked.is_empty() {
        return Err(CompressError::Validation(format!(
            "no usable output format among {:?}",
            allowed
        )));
    }

    let params = SearchParams::from_config(ctx.config);
    let effort = ctx.config.default_effort;
    let mut attempted = Vec::with_capacity(ranked.len());
    let mut iterations = 0;
    let mut winner: Option<SearchOutcome> = None;
    let mut fallback: Option<SearchOutcome> = None;

    for wave in ranked.chunks(ctx.config.workers.max(1)) {
        cancel.check()?;
        debug!("Quick wave: {:?}", wave.iter().map(|c| c.to_string()).collect::<Vec<_>>());

        let tasks = wave.iter().map(|choice| {
            let choice = *choice;
            let codec = ctx.registry.get(choice.format);
            let source = Arc::clone(&source);
            let cancel = cancel.clone();
            let base = choice.base_profile(effort);
            let slots = Arc::clone(ctx.encode_slots);
            async move {
                let codec = codec?;
                let permit = slots
                    .acquire_owned()
                    .await
                    .map_err(|e| CompressError::Validation(format!("encode slots closed: {}", e)))?;
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    search::find_best_fit_scored(
                        codec.as_ref(),
                        &source,
                        &base,
                        target_bytes,
                        &params,
                        quality_floor,
                        &cancel,
                    )
                })
                .await
                .map_err(|e| CompressError::encode_failed(choice.format, format!("worker failed: {}", e)))?
            }
        });
        let results = join_all(tasks).await;

        for (choice, result) in wave.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    iterations += outcome.iterations;
                    attempted.push(attempt_summary(choice, Some(&outcome), None));
                    let c = &outcome.candidate;
                    debug!(
                        "{} -> {} bytes, SSIM {:?}, {:?}",
                        choice, c.size_bytes, c.ssim_score, outcome.status
                    );

                    if winner.is_none() && outcome.status.is_success() && c.fits(target_bytes) && c.floor_ok() {
                        winner = Some(outcome);
                    } else if fallback
                        .as_ref()
                        .map_or(true, |best| is_better_fallback(&outcome.candidate, &best.candidate, target_bytes))
                    {
                        fallback = Some(outcome);
                    }
                }
                Err(e) if e.is_format_local() => {
                    warn!("⚠️  Skipping {}: {}", choice, e);
                    attempted.push(attempt_summary(choice, None, Some(e.to_string())));
                }
                Err(e) => return Err(e),
            }
        }

        if winner.is_some() {
            break;
        }
    }

    let (chosen, all_met) = match (winner, fallback) {
        (Some(w), _) => (w, true),
        (None, Some(f)) => (f, false),
        (None, None) => {
            return Err(CompressError::encode_failed(
                ranked[0].format,
                "every candidate format failed",
            ))
        }
    };

    let candidate = chosen.candidate;
    let target_met = candidate.fits(target_bytes);
    let suggested_dimensions = if target_met {
        None
    } else {
        suggest_dimensions(source.width(), source.height(), candidate.size_bytes, target_bytes)
    };

    if all_met {
        info!(
            "✅ Quick: {} at {} bytes (target {})",
            candidate.profile, candidate.size_bytes, target_bytes
        );
    } else {
        warn!(
            "Quick: constraints not met, best effort {} at {} bytes (target {})",
            candidate.profile, candidate.size_bytes, target_bytes
        );
    }

    Ok(JobReport {
        candidate,
        mode: "quick",
        target_bytes: Some(target_bytes),
        target_met,
        search_status: Some(chosen.status),
        iterations,
        attempted,
        suggested_dimensions,
        suggested_format: None,
        elapsed: started.elapsed(),
    })
}

fn attempt_summary(choice: &FormatChoice, outcome: Option<&SearchOutcome>, error: Option<String>) -> AttemptSummary {
    AttemptSummary {
        format: choice.format,
        lossless: choice.lossless,
        size_bytes: outcome.map(|o| o.candidate.size_bytes),
        ssim_score: outcome.and_then(|o| o.candidate.ssim_score),
        status: outcome.map(|o| o.status),
        iterations: outcome.map_or(0, |o| o.iterations),
        error,
    }
}

/// Fallback order: fits the target, then meets the floor, then higher SSIM, then smaller
fn is_better_fallback(candidate: &CandidateResult, best: &CandidateResult, target_bytes: u64) -> bool {
    let key = |c: &CandidateResult| (c.fits(target_bytes), c.floor_ok());
    match key(candidate).cmp(&key(best)) {
        Ordering::Greater => return true,
        Ordering::Less => return false,
        Ordering::Equal => {}
    }

    let ssim = |c: &CandidateResult| c.ssim_score.unwrap_or(-1.0);
    match ssim(candidate).partial_cmp(&ssim(best)) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) => false,
        _ => candidate.size_bytes < best.size_bytes,
    }
}
