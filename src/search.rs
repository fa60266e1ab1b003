//! # Search Primitives Module
//!
//! Le due ricerche monotone usate dal compressore progressivo.
//!
//! ## Responsabilità:
//! - `Ramp`: sequenza finita e monotona di valori (quality o CRF) con
//!   estremo garantito, validata alla costruzione
//! - `search_ramp()`: quality search, si ferma al primo probe entro budget
//! - `next_dimensions()`: un passo di resolution search con rilevamento
//!   dello scale floor
//!
//! ## Terminazione:
//! Una `Ramp` richiede `step > 0` e un estremo raggiungibile; l'ultimo valore
//! emesso è sempre l'estremo stesso, quindi produce al massimo
//! `⌈|start − end| / step⌉ + 1` valori e non supera mai l'estremo.

use crate::encoder::ProbeResult;
use crate::error::{CompressError, Result};

/// Finite monotonic sequence of encoder parameter values.
///
/// Descending ramps stop at the floor, ascending ramps at the cap; the
/// boundary itself is always the last value produced.
#[derive(Debug, Clone)]
pub struct Ramp {
    next: Option<u8>,
    end: u8,
    step: u8,
    descending: bool,
}

impl Ramp {
    /// `start, start - step, …, floor`. Requires `step > 0` and `floor <= start`.
    pub fn descending(start: u8, floor: u8, step: u8) -> Result<Self> {
        if step == 0 {
            return Err(CompressError::Validation("ramp step must be positive".to_string()));
        }
        if floor > start {
            return Err(CompressError::Validation(format!(
                "ramp floor {} is above its start {}",
                floor, start
            )));
        }
        Ok(Self {
            next: Some(start),
            end: floor,
            step,
            descending: true,
        })
    }

    /// `start, start + step, …, cap`. Requires `step > 0` and `start <= cap`.
    pub fn ascending(start: u8, cap: u8, step: u8) -> Result<Self> {
        if step == 0 {
            return Err(CompressError::Validation("ramp step must be positive".to_string()));
        }
        if start > cap {
            return Err(CompressError::Validation(format!(
                "ramp start {} is above its cap {}",
                start, cap
            )));
        }
        Ok(Self {
            next: Some(start),
            end: cap,
            step,
            descending: false,
        })
    }

    /// Upper bound on the number of values this ramp yields
    pub fn max_len(start: u8, end: u8, step: u8) -> usize {
        let span = usize::from(start.abs_diff(end));
        span.div_ceil(usize::from(step.max(1))) + 1
    }
}

impl Iterator for Ramp {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        self.next = if current == self.end {
            None
        } else if self.descending {
            Some(current.saturating_sub(self.step).max(self.end))
        } else {
            Some(current.saturating_add(self.step).min(self.end))
        };
        Some(current)
    }
}

/// Result of walking a ramp against a budget
#[derive(Debug, Clone, PartialEq)]
pub enum RampOutcome {
    /// A probe fit the budget
    Accepted { probe: ProbeResult, value: u8 },
    /// The boundary was probed and is still over budget
    Exhausted { probe: ProbeResult, value: u8 },
}

impl RampOutcome {
    pub fn probe(&self) -> &ProbeResult {
        match self {
            RampOutcome::Accepted { probe, .. } | RampOutcome::Exhausted { probe, .. } => probe,
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            RampOutcome::Accepted { value, .. } | RampOutcome::Exhausted { value, .. } => *value,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RampOutcome::Accepted { .. })
    }
}

/// Probes each ramp value in order until one fits `budget`.
///
/// The first encode failure aborts the walk. A ramp always yields at least
/// one value, so an outcome always carries a probe.
pub fn search_ramp<F>(ramp: Ramp, budget: u64, mut probe: F) -> Result<RampOutcome>
where
    F: FnMut(u8) -> Result<ProbeResult>,
{
    let mut last = None;
    for value in ramp {
        let result = probe(value)?;
        if result.size() <= budget {
            return Ok(RampOutcome::Accepted { probe: result, value });
        }
        last = Some((result, value));
    }
    let (probe, value) = last.ok_or_else(|| CompressError::Validation("empty ramp".to_string()))?;
    Ok(RampOutcome::Exhausted { probe, value })
}

/// One resolution search step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleStep {
    Resized { width: u32, height: u32 },
    /// Further downscaling is a no-op or would collapse an axis
    FloorReached,
}

/// Multiplies both axes by `ratio` (floored, at least 1 pixel).
pub fn next_dimensions(width: u32, height: u32, ratio: f64) -> ScaleStep {
    let scale_axis = |axis: u32| -> u32 { ((f64::from(axis) * ratio).floor() as u32).max(1) };
    let (new_width, new_height) = (scale_axis(width), scale_axis(height));

    if (new_width, new_height) == (width, height) || new_width.min(new_height) <= 1 {
        ScaleStep::FloorReached
    } else {
        ScaleStep::Resized {
            width: new_width,
            height: new_height,
        }
    }
}

/// Number of downscale steps from `(width, height)` until the floor
pub fn scale_steps_to_floor(mut width: u32, mut height: u32, ratio: f64) -> usize {
    let mut steps = 0;
    while let ScaleStep::Resized { width: w, height: h } = next_dimensions(width, height, ratio) {
        width = w;
        height = h;
        steps += 1;
    }
    steps
}
