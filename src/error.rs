//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia degli errori del motore di compressione.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare tutti i fallimenti per-file
//! - Fornisce messaggi di errore descrittivi con la causa originale
//! - Integra con `thiserror` per la conversione automatica degli errori I/O
//!
//! ## Categorie di errori:
//! - `Decode`: Sorgente illeggibile o corrotta
//! - `Encode`: L'encoder rifiuta la configurazione o fallisce
//! - `EncodeTimeout`: Probe esterno (ffmpeg) oltre il timeout
//! - `ConversionNotPermitted`: La policy vieta il cambio di formato
//! - `Persistence`: Scrittura temporanea o replace atomico fallito
//! - `CompressionFailed`: Run interrotto da un fallimento di encode
//! - `UnsupportedFormat`, `MissingDependency`, `Validation`
//!
//! ## Propagazione:
//! Tutti gli errori sono limitati al singolo file: l'orchestratore li
//! riporta e prosegue con il file successivo. Lo stato `ScaleFloorReached`
//! non è un errore ma uno stato terminale della ricerca (vedi `search`).

use std::path::PathBuf;
use std::time::Duration;

/// Failures of one compression run
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Encode failure: {0}")]
    Encode(String),

    #[error("Encoder timed out after {0:?}")]
    EncodeTimeout(Duration),

    #[error("Format conversion not permitted: {0}")]
    ConversionNotPermitted(String),

    #[error("Persistence failure for {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Invalid parameters: {0}")]
    Validation(String),
}

impl CompressError {
    /// Wraps an encoder-side failure into the run-level failure the caller sees.
    /// Errors that already describe the run (timeouts, persistence) pass through.
    pub fn into_run_failure(self) -> Self {
        match self {
            CompressError::Encode(reason) => CompressError::CompressionFailed(reason),
            CompressError::UnsupportedFormat(reason) => CompressError::CompressionFailed(reason),
            other => other,
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CompressError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
