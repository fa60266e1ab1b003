//! # Animated Raster Module
//!
//! Loop di quality proxy per le GIF: ogni probe ricodifica tutti i frame con
//! una palette più povera finché il risultato non entra nel budget o non si
//! arriva al floor. Nessun ridimensionamento.

use crate::encoder::{EncodeConfig, EncodeFlags, Encoder};
use crate::error::{CompressError, Result};
use crate::format::MediaFormat;
use crate::outcome::{CompressionOutcome, Payload};
use crate::search::{search_ramp, Ramp, RampOutcome};
use image::Frame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Quality proxy ramp for animations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatedSettings {
    pub initial_quality: u8,
    pub min_quality: u8,
    pub quality_step: u8,
}

impl Default for AnimatedSettings {
    fn default() -> Self {
        Self {
            initial_quality: 80,
            min_quality: 10,
            quality_step: 10,
        }
    }
}

impl AnimatedSettings {
    pub fn validate(&self) -> Result<()> {
        if self.initial_quality > 100 || self.min_quality == 0 {
            return Err(CompressError::Validation(
                "animated quality must be between 1 and 100".to_string(),
            ));
        }
        Ramp::descending(self.initial_quality, self.min_quality, self.quality_step).map(|_| ())
    }
}

/// Runs the proxy ramp over `frames` and returns the accepted or floor result.
/// The result always overwrites the source.
pub fn compress_animation<E>(
    encoder: &E,
    source: &Path,
    original_size: u64,
    frames: &[Frame],
    settings: &AnimatedSettings,
    budget: u64,
) -> Result<CompressionOutcome>
where
    E: Encoder<[Frame]> + ?Sized,
{
    let ramp = Ramp::descending(settings.initial_quality, settings.min_quality, settings.quality_step)?;
    let template = EncodeConfig::new(MediaFormat::Gif, EncodeFlags::default());

    let outcome = search_ramp(ramp, budget, |quality| {
        let probe = encoder.encode(frames, &template.with_quality(Some(quality)))?;
        debug!(
            "GIF probe q={} over {} frames -> {} bytes (budget {})",
            quality,
            frames.len(),
            probe.size(),
            budget
        );
        Ok(probe)
    })
    .map_err(CompressError::into_run_failure)?;

    let met_budget = outcome.is_accepted();
    let (probe, quality) = match outcome {
        RampOutcome::Accepted { probe, value } | RampOutcome::Exhausted { probe, value } => (probe, value),
    };

    Ok(CompressionOutcome {
        source: source.to_path_buf(),
        source_format: MediaFormat::Gif,
        original_size,
        final_size: probe.size(),
        payload: Payload::Bytes(probe.into_bytes()),
        final_format: MediaFormat::Gif,
        final_scale: 1.0,
        final_quality: Some(quality),
        format_changed: false,
        delete_original: false,
        met_budget,
    })
}
