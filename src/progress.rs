//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche del run.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking dell'esito di ogni file (in place, convertito, best effort, saltato, errore)
//! - Calcolo percentuali di riduzione e byte risparmiati
//! - Report finale con statistiche aggregate
//!
//! ## Statistiche tracciate:
//! - **files_processed**: Totale file elaborati
//! - **compressed_in_place**: Stesso formato, originale sovrascritto
//! - **converted**: Nuovo formato con rinomina
//! - **best_effort**: Risultato più piccolo ottenibile, ancora oltre budget
//! - **skipped**: File spariti o rientrati nel budget prima dell'elaborazione
//! - **errors**: File falliti (l'originale resta intatto)
//! - **total_bytes_saved**: Byte totali risparmiati
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) ✅ photo.jpg: 45.2% saved
//! ```

use crate::file_manager::FileManager;
use crate::outcome::OutcomeStatus;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Final state of one file in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    CompressedInPlace,
    Converted,
    BestEffort,
    Skipped,
    Failed,
}

impl From<OutcomeStatus> for FileStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::CompressedInPlace => FileStatus::CompressedInPlace,
            OutcomeStatus::Converted => FileStatus::Converted,
            OutcomeStatus::BestEffort => FileStatus::BestEffort,
        }
    }
}

/// Manages progress reporting for a shrink run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that draws nothing, for JSON mode
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Set a custom message without incrementing
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics tracker for one run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_processed: usize,
    pub compressed_in_place: usize,
    pub converted: usize,
    pub best_effort: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: FileStatus, original_size: u64, new_size: u64) {
        self.files_processed += 1;
        self.total_original_size += original_size;
        match status {
            FileStatus::CompressedInPlace => self.compressed_in_place += 1,
            FileStatus::Converted => self.converted += 1,
            FileStatus::BestEffort => self.best_effort += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Failed => self.errors += 1,
        }
        if matches!(
            status,
            FileStatus::CompressedInPlace | FileStatus::Converted | FileStatus::BestEffort
        ) {
            self.total_bytes_saved += original_size.saturating_sub(new_size);
        }
    }

    /// Files rewritten on disk (or that would be, in a dry run)
    pub fn files_compressed(&self) -> usize {
        self.compressed_in_place + self.converted + self.best_effort
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | In place: {} | Converted: {} | Best effort: {} | Skipped: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.compressed_in_place,
            self.converted,
            self.best_effort,
            self.skipped,
            self.errors,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
