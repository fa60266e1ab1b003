//! # Format Policy Module
//!
//! Tabella di decisione per formato sorgente: sceglie il container di
//! destinazione, i flag dell'encoder e l'azione di naming.
//!
//! ## Responsabilità:
//! - `decide()`: lookup della riga di policy da famiglia + alpha
//! - `plan_still()`: catena ordinata di strategie (`PlanStep`) per le immagini statiche
//! - `StillPipeline`: esegue la catena con il `ProgressiveCompressor`
//!
//! ## Tabella:
//! | Sorgente | Alpha | Strategie |
//! |----------|-------|-----------|
//! | JPEG | - | JPEG in place |
//! | PNG | sì | PNG lossless + scale, poi WebP lossy con alpha (se permesso) |
//! | PNG | no | JPEG, rinomina, elimina originale |
//! | WebP | - | WebP in place (method alto) |
//! | GIF | - | quality proxy sui frame (vedi `animation`) |
//! | Video | - | rampa CRF (vedi `video_processor`) |
//! | BMP/TIFF | - | formato rilevato, fallback JPEG mantenendo l'originale |
//!
//! Le catene avanzano al passo successivo quando il risultato resta fuori
//! budget (`OnOverBudget`) oppure quando l'encode fallisce (`OnFailure`).

use crate::compressor::{ProgressiveCompressor, SearchParams, SearchResult};
use crate::encoder::{EncodeConfig, EncodeFlags, Encoder, Resampler};
use crate::error::{CompressError, Result};
use crate::format::{FormatFamily, MediaFormat};
use crate::media::flatten_to_rgb;
use crate::outcome::{CompressionOutcome, Payload};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Policy knobs taken from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOptions {
    /// Allow alpha PNGs to become lossy WebP
    pub allow_alpha_conversion: bool,
    /// Lossless PNG effort (oxipng preset 0-6)
    pub png_effort: u8,
    /// libwebp method (0-6)
    pub webp_method: u8,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            allow_alpha_conversion: true,
            png_effort: 6,
            webp_method: 6,
        }
    }
}

/// Row of the policy table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Lossy raster kept in its container
    KeepLossy,
    /// Lossless with alpha: lossless rounds, then lossy-with-alpha conversion
    LosslessThenConvert,
    /// Lossless without alpha: convert to JPEG
    ConvertOpaque,
    AnimatedProxy,
    VideoRamp,
    /// Re-encode as detected, JPEG as fallback
    SameFormatWithFallback,
}

pub fn decide(format: MediaFormat, has_alpha: bool) -> Decision {
    match format.capabilities().family {
        FormatFamily::LossyRaster => Decision::KeepLossy,
        FormatFamily::LosslessRaster if has_alpha => Decision::LosslessThenConvert,
        FormatFamily::LosslessRaster => Decision::ConvertOpaque,
        FormatFamily::AnimatedRaster => Decision::AnimatedProxy,
        FormatFamily::Video => Decision::VideoRamp,
        FormatFamily::Other => Decision::SameFormatWithFallback,
    }
}

/// When a chain moves on to its next strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    OnOverBudget,
    OnFailure,
}

/// One strategy of a chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanStep {
    pub target: MediaFormat,
    pub flags: EncodeFlags,
    /// Drop alpha before encoding, set when the target container cannot carry it
    pub flatten: bool,
    /// A renamed result leaves the source in place
    pub keep_original: bool,
}

impl PlanStep {
    fn new(target: MediaFormat, flags: EncodeFlags, has_alpha: bool) -> Self {
        Self {
            target,
            flags,
            flatten: has_alpha && !target.capabilities().alpha,
            keep_original: false,
        }
    }

    fn keeping_original(mut self) -> Self {
        self.keep_original = true;
        self
    }
}

/// Ordered strategies for one still image
#[derive(Debug, Clone)]
pub struct Plan {
    pub decision: Decision,
    pub steps: Vec<PlanStep>,
    pub advance: Advance,
    /// Why a conversion step was left out
    pub blocked: Option<String>,
}

/// Checks whether a change from `from` to `to` is allowed for an image with alpha
pub fn conversion_permitted(
    options: &PolicyOptions,
    from: MediaFormat,
    to: MediaFormat,
    has_alpha: bool,
) -> Result<()> {
    if has_alpha && from != to && !options.allow_alpha_conversion {
        return Err(CompressError::ConversionNotPermitted(format!(
            "{} with alpha may not become {}",
            from, to
        )));
    }
    Ok(())
}

fn jpeg_flags() -> EncodeFlags {
    EncodeFlags {
        progressive: true,
        optimize: true,
        ..EncodeFlags::default()
    }
}

fn webp_flags(options: &PolicyOptions) -> EncodeFlags {
    EncodeFlags {
        effort: Some(options.webp_method),
        ..EncodeFlags::default()
    }
}

/// Builds the strategy chain for a still image in `format`
pub fn plan_still(format: MediaFormat, has_alpha: bool, options: &PolicyOptions) -> Result<Plan> {
    let decision = decide(format, has_alpha);
    let mut blocked = None;
    let (steps, advance) = match decision {
        Decision::KeepLossy => {
            let flags = match format {
                MediaFormat::WebP => webp_flags(options),
                _ => jpeg_flags(),
            };
            (vec![PlanStep::new(format, flags, has_alpha)], Advance::OnOverBudget)
        }
        Decision::LosslessThenConvert => {
            let lossless = EncodeFlags {
                lossless: true,
                effort: Some(options.png_effort),
                ..EncodeFlags::default()
            };
            let mut steps = vec![PlanStep::new(format, lossless, has_alpha)];
            match conversion_permitted(options, format, MediaFormat::WebP, has_alpha) {
                Ok(()) => steps.push(PlanStep::new(MediaFormat::WebP, webp_flags(options), has_alpha)),
                Err(e) => {
                    debug!("{}", e);
                    blocked = Some(e.to_string());
                }
            }
            (steps, Advance::OnOverBudget)
        }
        Decision::ConvertOpaque => (
            vec![PlanStep::new(MediaFormat::Jpeg, jpeg_flags(), has_alpha)],
            Advance::OnOverBudget,
        ),
        Decision::SameFormatWithFallback => (
            vec![
                PlanStep::new(format, EncodeFlags::default(), has_alpha),
                PlanStep::new(MediaFormat::Jpeg, jpeg_flags(), has_alpha).keeping_original(),
            ],
            Advance::OnFailure,
        ),
        Decision::AnimatedProxy | Decision::VideoRamp => {
            return Err(CompressError::UnsupportedFormat(format!(
                "{} is not a still image format",
                format
            )))
        }
    };
    Ok(Plan {
        decision,
        steps,
        advance,
        blocked,
    })
}

/// Runs a still-image plan against one decoded image
pub struct StillPipeline<'a, E: ?Sized, R: ?Sized> {
    encoder: &'a E,
    resampler: &'a R,
    params: SearchParams,
    budget: u64,
}

impl<'a, E, R> StillPipeline<'a, E, R>
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

    /// Tries the plan's strategies in order. Every strategy starts from the
    /// untouched source image.
    pub fn run(
        &self,
        source: &Path,
        source_format: MediaFormat,
        original_size: u64,
        image: &DynamicImage,
        plan: &Plan,
    ) -> Result<CompressionOutcome> {
        let compressor = ProgressiveCompressor::new(self.encoder, self.resampler, self.params, self.budget)?;
        let mut last: Option<(PlanStep, SearchResult)> = None;
        let mut last_error = None;

        for (index, step) in plan.steps.iter().enumerate() {
            debug!(
                "Strategy {}/{} for {}: {}",
                index + 1,
                plan.steps.len(),
                source.display(),
                step.target
            );
            let input = if step.flatten {
                flatten_to_rgb(image)
            } else {
                image.clone()
            };
            let template = EncodeConfig::new(step.target, step.flags);

            match compressor.compress(input, template) {
                Ok(result) => {
                    let fits = result.met_budget;
                    last = Some((*step, result));
                    if fits || plan.advance == Advance::OnFailure {
                        break;
                    }
                    info!(
                        "{} still over budget as {}, trying next strategy",
                        source.display(),
                        step.target
                    );
                }
                Err(e) if plan.advance == Advance::OnFailure => {
                    warn!("{} failed as {}: {}", source.display(), step.target, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let (step, result) = match (last, last_error) {
            (Some(found), _) => found,
            (None, Some(e)) => return Err(e),
            (None, None) => {
                return Err(CompressError::CompressionFailed(format!(
                    "no strategy available for {}",
                    source_format
                )))
            }
        };

        let format_changed = step.target != source_format;
        Ok(CompressionOutcome {
            source: source.to_path_buf(),
            source_format,
            original_size,
            final_size: result.probe.size(),
            payload: Payload::Bytes(result.probe.into_bytes()),
            final_format: step.target,
            final_scale: result.scale,
            final_quality: result.quality,
            format_changed,
            delete_original: format_changed && !step.keep_original,
            met_budget: result.met_budget,
        })
    }
}
