//! # Media Optimizer Main Orchestrator
//!
//! Orchestratore principale: discovery, verifica dipendenze, elaborazione
//! sequenziale dei file e report finale. Un fallimento su un file non
//! interrompe mai il run.

use crate::{
    config::Config,
    file_manager::{Candidate, FileManager},
    format::MediaKind,
    json_output::{JsonConfig, JsonMessage},
    optimizer::task_optimizer::{FileReport, TaskOptimizer},
    platform::{PlatformCommands, VIDEO_TOOLS},
    progress::{FileStatus, ProgressManager, RunStats},
    video_processor::VideoProcessor,
};
use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs a shrink pass over a directory tree
pub struct MediaOptimizer {
    config: Config,
    video_processor: Option<VideoProcessor>,
}

impl MediaOptimizer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            video_processor: None,
        })
    }

    /// Uses `video_processor` for every video instead of the ffmpeg found in PATH
    pub fn with_video_processor(mut self, video_processor: VideoProcessor) -> Self {
        self.video_processor = Some(video_processor);
        self
    }

    pub async fn run(self, root: &Path) -> Result<RunStats> {
        if !root.exists() {
            let message = format!("Media path does not exist: {}", root.display());
            if self.config.json_output {
                JsonMessage::error(message.clone(), None).emit();
            }
            return Err(anyhow::anyhow!(message));
        }

        let start_time = Instant::now();
        let candidates: Vec<Candidate> = FileManager::discover(root, self.config.budgets).collect();
        self.emit_start_message(root, &candidates);

        let task = self.build_task(&candidates).await;
        let progress = if self.config.json_output {
            ProgressManager::hidden()
        } else {
            ProgressManager::new(candidates.len() as u64)
        };

        let mut stats = RunStats::new();
        let total = candidates.len();
        for (index, candidate) in candidates.iter().enumerate() {
            if self.config.json_output {
                JsonMessage::file_start(candidate.path.clone(), candidate.size, index + 1, total).emit();
            } else {
                progress.set_message(&display_name(&candidate.path));
            }

            let report = task.process(candidate).await;
            stats.record(report.status, report.original_size, report.new_size);
            log_report(&report);

            if self.config.json_output {
                JsonMessage::file_complete(&report).emit();
            }
            progress.update(&progress_message(&report));
        }

        progress.finish(&stats.format_summary());
        self.print_final_stats(&stats, start_time.elapsed().as_secs_f64());
        Ok(stats)
    }

    async fn build_task(&self, candidates: &[Candidate]) -> TaskOptimizer {
        let has_videos = candidates.iter().any(|c| c.format.kind() == MediaKind::Video);
        if let Some(video_processor) = &self.video_processor {
            return TaskOptimizer::new(self.config.clone(), true).with_video_processor(video_processor.clone());
        }

        let video_available = if has_videos {
            let missing = PlatformCommands::instance().missing_tools(&VIDEO_TOOLS).await;
            if !missing.is_empty() {
                warn!(
                    "{} not found in PATH; videos will be reported as failed",
                    missing.join(", ")
                );
            }
            missing.is_empty()
        } else {
            false
        };
        TaskOptimizer::new(self.config.clone(), video_available)
    }

    fn emit_start_message(&self, root: &Path, candidates: &[Candidate]) {
        if self.config.json_output {
            JsonMessage::start(root.to_path_buf(), candidates.len(), JsonConfig::from(&self.config)).emit();
            return;
        }

        info!("Starting media shrink in: {}", root.display());
        info!(
            "Budgets: images {}, animations {}, videos {}",
            FileManager::format_size(self.config.budgets.image),
            FileManager::format_size(self.config.budgets.animated),
            FileManager::format_size(self.config.budgets.video)
        );
        info!(
            "Quality ramp: {} -> {} (step {}), downscale ratio {}",
            self.config.search.initial_quality,
            self.config.search.min_quality,
            self.config.search.quality_step,
            self.config.search.downscale_ratio
        );
        if !self.config.policy.allow_alpha_conversion {
            info!("Alpha PNG conversion disabled: oversized PNGs stay PNG");
        }
        if self.config.dry_run {
            info!("Dry run mode: No files will be modified");
        }
        info!("Found {} files over budget", candidates.len());
    }

    fn print_final_stats(&self, stats: &RunStats, duration: f64) {
        if self.config.json_output {
            JsonMessage::complete(stats, duration).emit();
            return;
        }

        info!("=== Shrink Complete ===");
        info!("Files processed: {}", stats.files_processed);
        info!("Files rewritten: {}", stats.files_compressed());
        info!("Compressed in place: {}", stats.compressed_in_place);
        info!("Converted: {}", stats.converted);
        info!("Best effort (still over budget): {}", stats.best_effort);
        info!("Skipped: {}", stats.skipped);
        info!("Errors: {}", stats.errors);
        info!("Bytes saved: {}", FileManager::format_size(stats.total_bytes_saved));
        info!("Average reduction: {:.2}%", stats.overall_reduction_percent());
        info!("Duration: {:.1}s", duration);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn progress_message(report: &FileReport) -> String {
    let name = display_name(&report.path);
    match report.status {
        FileStatus::Failed => format!("❌ {}", name),
        FileStatus::Skipped => format!("⏩ {}", name),
        _ => format!(
            "✅ {}: {:.1}% saved",
            name,
            FileManager::calculate_reduction(report.original_size, report.new_size)
        ),
    }
}

fn log_report(report: &FileReport) {
    let before = FileManager::format_size(report.original_size);
    let after = FileManager::format_size(report.new_size);
    match report.status {
        FileStatus::CompressedInPlace => {
            info!("{}: {} -> {}", report.path.display(), before, after)
        }
        FileStatus::Converted => info!(
            "{}: {} -> {} as {}",
            report.path.display(),
            before,
            after,
            report
                .final_path
                .as_deref()
                .map(display_name)
                .unwrap_or_default()
        ),
        FileStatus::BestEffort => warn!(
            "{}: {} -> {} (best effort, still over budget)",
            report.path.display(),
            before,
            after
        ),
        FileStatus::Skipped => info!("{}: skipped", report.path.display()),
        FileStatus::Failed => error!(
            "{}: {}",
            report.path.display(),
            report.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
