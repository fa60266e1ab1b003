//! # Compression Outcome Module
//!
//! Risultato terminale di un run: un solo `CompressionOutcome` per file,
//! prodotto dal motore e consumato dal livello di persistenza.

use crate::format::MediaFormat;
use serde::Serialize;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Final encoded content of a run
#[derive(Debug)]
pub enum Payload {
    /// Raster result held in memory
    Bytes(Vec<u8>),
    /// Video result already written next to the source by the external encoder
    Staged(NamedTempFile),
}

/// How a finished run is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Same container, original overwritten
    CompressedInPlace,
    /// Written under a new extension
    Converted,
    /// Smallest achievable result, still over budget
    BestEffort,
}

#[derive(Debug)]
pub struct CompressionOutcome {
    pub source: PathBuf,
    pub source_format: MediaFormat,
    pub original_size: u64,
    pub payload: Payload,
    pub final_size: u64,
    pub final_format: MediaFormat,
    pub final_scale: f64,
    /// Quality (or CRF for video) of the accepted probe
    pub final_quality: Option<u8>,
    pub format_changed: bool,
    pub delete_original: bool,
    pub met_budget: bool,
}

impl CompressionOutcome {
    pub fn status(&self) -> OutcomeStatus {
        if !self.met_budget {
            OutcomeStatus::BestEffort
        } else if self.format_changed {
            OutcomeStatus::Converted
        } else {
            OutcomeStatus::CompressedInPlace
        }
    }

    pub fn bytes_saved(&self) -> i64 {
        self.original_size as i64 - self.final_size as i64
    }
}
