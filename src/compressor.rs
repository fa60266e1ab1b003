//! # Progressive Compressor Module
//!
//! Orchestratore della ricerca per le immagini statiche: alterna quality
//! search e resolution search finché il risultato non rientra nel budget o
//! non si raggiunge lo scale floor.
//!
//! ## Macchina a stati:
//! ```text
//! Probing ──accettato──▶ Accepted
//!    │ esaurito
//!    ▼
//! Downscaling ──scale floor──▶ GaveUp (best effort)
//!    │ ridimensionato
//!    └──────▶ Probing (quality ripartita da initial_quality)
//! ```
//!
//! ## Garanzie:
//! - Ogni run restituisce esattamente un `ProbeResult`
//! - Nessuna coppia (quality, dimensioni) viene codificata due volte
//! - Le dimensioni decrescono strettamente ad ogni livello
//! - Un fallimento di encode interrompe il run come `CompressionFailed`

use crate::encoder::{EncodeConfig, Encoder, ProbeResult, Resampler};
use crate::error::{CompressError, Result};
use crate::format::MediaFormat;
use crate::search::{next_dimensions, search_ramp, Ramp, RampOutcome, ScaleStep};
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quality/resolution search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// First quality of every ramp (1-100)
    pub initial_quality: u8,
    /// Lowest quality ever probed
    pub min_quality: u8,
    pub quality_step: u8,
    /// Per-axis factor of one downscale step, in (0, 1)
    pub downscale_ratio: f64,
    /// Best-effort quality once the scale floor is hit (clamped to the floor)
    pub give_up_quality: u8,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            initial_quality: 95,
            min_quality: 20,
            quality_step: 5,
            downscale_ratio: 0.9,
            give_up_quality: 10,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.initial_quality == 0 || self.initial_quality > 100 {
            return Err(CompressError::Validation(
                "initial quality must be between 1 and 100".to_string(),
            ));
        }
        if self.min_quality == 0 || self.min_quality > self.initial_quality {
            return Err(CompressError::Validation(format!(
                "minimum quality must be between 1 and the initial quality ({})",
                self.initial_quality
            )));
        }
        if self.quality_step == 0 {
            return Err(CompressError::Validation("quality step must be positive".to_string()));
        }
        if !(self.downscale_ratio > 0.0 && self.downscale_ratio < 1.0) {
            return Err(CompressError::Validation(
                "downscale ratio must be strictly between 0 and 1".to_string(),
            ));
        }
        if self.give_up_quality > 100 {
            return Err(CompressError::Validation(
                "give-up quality must be at most 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Quality of the best-effort probe: `max(min_quality, give_up_quality)`
    pub fn best_effort_quality(&self) -> u8 {
        self.min_quality.max(self.give_up_quality).min(self.initial_quality)
    }

    fn quality_ramp(&self) -> Result<Ramp> {
        Ramp::descending(self.initial_quality, self.min_quality, self.quality_step)
    }
}

/// States of one compression run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressorState {
    Probing,
    Downscaling,
    Accepted,
    GaveUp,
}

/// One encode performed during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRecord {
    pub quality: Option<u8>,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Terminal result of a run
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub probe: ProbeResult,
    pub format: MediaFormat,
    pub quality: Option<u8>,
    /// Final width relative to the source width
    pub scale: f64,
    pub width: u32,
    pub height: u32,
    pub met_budget: bool,
    pub final_state: CompressorState,
    pub trace: Vec<ProbeRecord>,
}

/// Drives quality and resolution rounds over one still image
pub struct ProgressiveCompressor<'a, E: ?Sized, R: ?Sized> {
    encoder: &'a E,
    resampler: &'a R,
    params: SearchParams,
    budget: u64,
}

impl<'a, E, R> ProgressiveCompressor<'a, E, R>
where
    E: Encoder<DynamicImage> + ?Sized,
    R: Resampler + ?Sized,
{
    pub fn new(encoder: &'a E, resampler: &'a R, params: SearchParams, budget: u64) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            encoder,
            resampler,
            params,
            budget,
        })
    }

    /// Runs the search on `image`, encoding with `template`'s format and flags.
    pub fn compress(&self, image: DynamicImage, template: EncodeConfig) -> Result<SearchResult> {
        self.run(image, template).map_err(CompressError::into_run_failure)
    }

    fn run(&self, image: DynamicImage, template: EncodeConfig) -> Result<SearchResult> {
        let source_width = image.width();
        let quality_capable = template.format.supports_quality();
        let mut work = image;
        let mut trace = Vec::new();
        let mut current: Option<(ProbeResult, Option<u8>)> = None;
        let mut reusable_best_effort: Option<ProbeResult> = None;
        let mut state = CompressorState::Probing;

        let final_state = loop {
            state = match state {
                CompressorState::Probing => {
                    let config = template.with_scale(relative_scale(&work, source_width));
                    let (fits, probe, quality) = if quality_capable {
                        self.quality_level(&work, config, &mut trace, &mut reusable_best_effort)?
                    } else {
                        let probe = self.probe(&work, config, &mut trace)?;
                        (probe.size() <= self.budget, probe, None)
                    };
                    current = Some((probe, quality));
                    if fits {
                        CompressorState::Accepted
                    } else {
                        CompressorState::Downscaling
                    }
                }
                CompressorState::Downscaling => {
                    let (width, height) = work.dimensions();
                    match next_dimensions(width, height, self.params.downscale_ratio) {
                        ScaleStep::Resized { width, height } => {
                            debug!("Downscaling to {}x{}", width, height);
                            work = self.resampler.resize(&work, width, height);
                            reusable_best_effort = None;
                            CompressorState::Probing
                        }
                        ScaleStep::FloorReached => {
                            debug!("Scale floor reached at {}x{}", width, height);
                            let last = current.take().ok_or_else(|| {
                                CompressError::CompressionFailed("no probe before give-up".to_string())
                            })?;
                            current = Some(self.best_effort(
                                &work,
                                template.with_scale(relative_scale(&work, source_width)),
                                last,
                                reusable_best_effort.take(),
                                &mut trace,
                            )?);
                            CompressorState::GaveUp
                        }
                    }
                }
                terminal @ (CompressorState::Accepted | CompressorState::GaveUp) => break terminal,
            };
        };

        let (probe, quality) = current
            .ok_or_else(|| CompressError::CompressionFailed("search produced no result".to_string()))?;
        let (width, height) = work.dimensions();
        Ok(SearchResult {
            met_budget: probe.size() <= self.budget,
            probe,
            format: template.format,
            quality,
            scale: relative_scale(&work, source_width),
            width,
            height,
            final_state,
            trace,
        })
    }

    /// Full quality ramp at the current resolution
    fn quality_level(
        &self,
        work: &DynamicImage,
        config: EncodeConfig,
        trace: &mut Vec<ProbeRecord>,
        reusable_best_effort: &mut Option<ProbeResult>,
    ) -> Result<(bool, ProbeResult, Option<u8>)> {
        let best_effort_quality = self.params.best_effort_quality();
        let outcome = search_ramp(self.params.quality_ramp()?, self.budget, |quality| {
            let probe = self.probe(work, config.with_quality(Some(quality)), trace)?;
            if quality == best_effort_quality {
                *reusable_best_effort = Some(probe.clone());
            }
            Ok(probe)
        })?;
        Ok(match outcome {
            RampOutcome::Accepted { probe, value } => (true, probe, Some(value)),
            RampOutcome::Exhausted { probe, value } => (false, probe, Some(value)),
        })
    }

    /// Give-up policy: one last probe at the clamped minimum quality,
    /// reusing an earlier encode of the same pair when there is one.
    fn best_effort(
        &self,
        work: &DynamicImage,
        config: EncodeConfig,
        last: (ProbeResult, Option<u8>),
        reusable: Option<ProbeResult>,
        trace: &mut Vec<ProbeRecord>,
    ) -> Result<(ProbeResult, Option<u8>)> {
        if !config.format.supports_quality() {
            return Ok(last);
        }
        let quality = self.params.best_effort_quality();
        if last.1 == Some(quality) {
            return Ok(last);
        }
        if let Some(probe) = reusable {
            return Ok((probe, Some(quality)));
        }
        let probe = self.probe(work, config.with_quality(Some(quality)), trace)?;
        Ok((probe, Some(quality)))
    }

    fn probe(
        &self,
        work: &DynamicImage,
        config: EncodeConfig,
        trace: &mut Vec<ProbeRecord>,
    ) -> Result<ProbeResult> {
        let probe = self.encoder.encode(work, &config)?;
        let (width, height) = work.dimensions();
        debug!(
            "Probe {} q={:?} {}x{} -> {} bytes (budget {})",
            config.format,
            config.quality,
            width,
            height,
            probe.size(),
            self.budget
        );
        trace.push(ProbeRecord {
            quality: config.quality,
            width,
            height,
            size: probe.size(),
        });
        Ok(probe)
    }
}

fn relative_scale(work: &DynamicImage, source_width: u32) -> f64 {
    if source_width == 0 {
        1.0
    } else {
        f64::from(work.width()) / f64::from(source_width)
    }
}
