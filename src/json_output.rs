//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da altri programmi.
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout per ogni evento del run
//! - Riusa `RunStats` e `FileReport` invece di duplicare i dati
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del run con configurazione effettiva
//! - `file_start`: Inizio elaborazione di un file
//! - `file_complete`: Fine elaborazione di un file (esito, dimensioni, errore)
//! - `complete`: Fine del run con statistiche finali
//! - `error`: Errore che interrompe il run

use crate::config::Config;
use crate::file_manager::FileManager;
use crate::optimizer::task_optimizer::FileReport;
use crate::progress::{FileStatus, RunStats};
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "start")]
    Start {
        input_path: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    #[serde(rename = "file_start")]
    FileStart {
        path: PathBuf,
        size: u64,
        index: usize,
        total: usize,
    },

    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        final_path: Option<PathBuf>,
        original_size: u64,
        new_size: u64,
        reduction_percent: f64,
        status: FileStatus,
        met_budget: bool,
        error: Option<String>,
    },

    #[serde(rename = "complete")]
    Complete {
        #[serde(flatten)]
        stats: RunStats,
        average_reduction: f64,
        duration_seconds: f64,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub image_budget: u64,
    pub animated_budget: u64,
    pub video_budget: u64,
    pub min_quality: u8,
    pub allow_alpha_conversion: bool,
    pub dry_run: bool,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input_path: PathBuf, total_files: usize, config: JsonConfig) -> Self {
        Self::Start {
            input_path,
            total_files,
            config,
        }
    }

    pub fn file_start(path: PathBuf, size: u64, index: usize, total: usize) -> Self {
        Self::FileStart {
            path,
            size,
            index,
            total,
        }
    }

    pub fn file_complete(report: &FileReport) -> Self {
        Self::FileComplete {
            path: report.path.clone(),
            final_path: report.final_path.clone(),
            original_size: report.original_size,
            new_size: report.new_size,
            reduction_percent: FileManager::calculate_reduction(report.original_size, report.new_size),
            status: report.status,
            met_budget: report.met_budget,
            error: report.error.clone(),
        }
    }

    pub fn complete(stats: &RunStats, duration_seconds: f64) -> Self {
        Self::Complete {
            stats: stats.clone(),
            average_reduction: stats.overall_reduction_percent(),
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            image_budget: config.budgets.image,
            animated_budget: config.budgets.animated,
            video_budget: config.budgets.video,
            min_quality: config.search.min_quality,
            allow_alpha_conversion: config.policy.allow_alpha_conversion,
            dry_run: config.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_complete_shape() {
        let report = FileReport {
            path: PathBuf::from("a.png"),
            final_path: Some(PathBuf::from("a.jpg")),
            original_size: 4_000,
            new_size: 1_000,
            status: FileStatus::Converted,
            met_budget: true,
            error: None,
        };
        let value = serde_json::to_value(JsonMessage::file_complete(&report)).unwrap();

        assert_eq!(value["type"], "file_complete");
        assert_eq!(value["status"], "converted");
        assert_eq!(value["final_path"], "a.jpg");
        assert_eq!(value["reduction_percent"], 75.0);
    }

    #[test]
    fn test_complete_flattens_stats() {
        let mut stats = RunStats::new();
        stats.record(FileStatus::CompressedInPlace, 1_000, 500);
        let value = serde_json::to_value(JsonMessage::complete(&stats, 1.5)).unwrap();

        assert_eq!(value["type"], "complete");
        assert_eq!(value["compressed_in_place"], 1);
        assert_eq!(value["total_bytes_saved"], 500);
        assert_eq!(value["duration_seconds"], 1.5);
    }

    #[test]
    fn test_start_carries_config() {
        let message = JsonMessage::start(PathBuf::from("/media"), 3, JsonConfig::from(&Config::default()));
        let value = serde_json::to_value(message).unwrap();
        assert_eq!(value["type"], "start");
        assert_eq!(value["config"]["image_budget"], 1_048_576);
    }
}
