//! # Task Optimizer Module
//!
//! Worker per la compressione di un singolo file.
//! Separato dall'orchestratore principale: qui avvengono decodifica,
//! scelta della policy, ricerca e persistenza del risultato.
//!
//! ## Flusso per file:
//! 1. Ricontrolla esistenza e dimensione (un rename precedente può averlo rimosso)
//! 2. Decodifica una sola volta in un `MediaBuffer`
//! 3. Instrada verso immagini statiche, animazioni o video
//! 4. Calcola il path finale e persiste (salvo `dry_run`)
//!
//! Ogni errore resta confinato al file e diventa un `FileReport` con stato `Failed`.

use crate::{
    animation::compress_animation,
    config::Config,
    encoder::{ImageCodec, LanczosResampler},
    error::{CompressError, Result},
    file_manager::{Candidate, FileManager},
    format::{MediaFormat, MediaKind},
    media::{has_alpha, MediaBuffer},
    optimizer::path_resolver::PathResolver,
    outcome::CompressionOutcome,
    policy::{plan_still, StillPipeline},
    progress::FileStatus,
    video_processor::VideoProcessor,
};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of one file, as reported to the user
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub path: PathBuf,
    pub final_path: Option<PathBuf>,
    pub original_size: u64,
    pub new_size: u64,
    pub status: FileStatus,
    pub met_budget: bool,
    pub error: Option<String>,
}

impl FileReport {
    fn skipped(path: &Path, size: u64, reason: &str) -> Self {
        debug!("Skipping {}: {}", path.display(), reason);
        Self {
            path: path.to_path_buf(),
            final_path: None,
            original_size: size,
            new_size: size,
            status: FileStatus::Skipped,
            met_budget: true,
            error: None,
        }
    }

    fn failed(path: &Path, size: u64, error: &CompressError) -> Self {
        Self {
            path: path.to_path_buf(),
            final_path: None,
            original_size: size,
            new_size: size,
            status: FileStatus::Failed,
            met_budget: false,
            error: Some(error.to_string()),
        }
    }
}

/// Worker per elaborazione singoli file
pub struct TaskOptimizer {
    config: Config,
    codec: ImageCodec,
    resampler: LanczosResampler,
    video_processor: VideoProcessor,
    video_available: bool,
}

impl TaskOptimizer {
    pub fn new(config: Config, video_available: bool) -> Self {
        let video_processor =
            VideoProcessor::new(config.video.clone(), config.budgets.video, config.probe_timeout());
        Self {
            config,
            codec: ImageCodec,
            resampler: LanczosResampler,
            video_processor,
            video_available,
        }
    }

    /// Replaces the ffmpeg processor, e.g. with one running a wrapper program
    pub fn with_video_processor(mut self, video_processor: VideoProcessor) -> Self {
        self.video_processor = video_processor;
        self.video_available = true;
        self
    }

    /// Processa un singolo file
    pub async fn process(&self, candidate: &Candidate) -> FileReport {
        let budget = self.config.budgets.for_kind(candidate.format.kind());
        let original_size = match tokio::fs::metadata(&candidate.path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => return FileReport::skipped(&candidate.path, candidate.size, "no longer exists"),
        };
        if original_size <= budget {
            return FileReport::skipped(&candidate.path, original_size, "already within budget");
        }

        let result = match self.compress(candidate, original_size, budget).await {
            Ok(outcome) => self.finish(outcome),
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => report,
            Err(e) => FileReport::failed(&candidate.path, original_size, &e),
        }
    }

    async fn compress(&self, candidate: &Candidate, original_size: u64, budget: u64) -> Result<CompressionOutcome> {
        if candidate.format.kind() == MediaKind::Video && !self.video_available {
            return Err(CompressError::MissingDependency(
                "ffmpeg is required for video processing".to_string(),
            ));
        }

        match MediaBuffer::load(&candidate.path, candidate.format)? {
            MediaBuffer::Still { image, detected } => {
                self.compress_still(candidate, original_size, budget, &image, detected)
            }
            MediaBuffer::Animated(frames) => compress_animation(
                &self.codec,
                &candidate.path,
                original_size,
                &frames,
                &self.config.animated,
                budget,
            ),
            MediaBuffer::Clip(path) => {
                self.video_processor
                    .compress(&path, candidate.format, original_size)
                    .await
            }
        }
    }

    fn compress_still(
        &self,
        candidate: &Candidate,
        original_size: u64,
        budget: u64,
        image: &DynamicImage,
        detected: Option<MediaFormat>,
    ) -> Result<CompressionOutcome> {
        // Policy follows the bytes; a still decoded from an animated or
        // unknown container falls back to the extension.
        let policy_format = detected
            .filter(|format| format.kind() == MediaKind::Image)
            .unwrap_or(candidate.format);
        if policy_format != candidate.format {
            info!(
                "{} contains {} data despite its extension",
                candidate.path.display(),
                policy_format
            );
        }

        let plan = plan_still(policy_format, has_alpha(image), &self.config.policy)?;
        if let Some(reason) = &plan.blocked {
            info!("{}: {}", candidate.path.display(), reason);
        }

        let pipeline = StillPipeline::new(&self.codec, &self.resampler, self.config.search, budget)?;
        pipeline.run(&candidate.path, candidate.format, original_size, image, &plan)
    }

    fn finish(&self, outcome: CompressionOutcome) -> Result<FileReport> {
        let destination = PathResolver::destination_for(&outcome.source, outcome.final_format)?;
        let status = FileStatus::from(outcome.status());
        let mut report = FileReport {
            path: outcome.source.clone(),
            final_path: Some(destination.clone()),
            original_size: outcome.original_size,
            new_size: outcome.final_size,
            status,
            met_budget: outcome.met_budget,
            error: None,
        };

        if self.config.dry_run {
            info!(
                "[dry run] would write {} ({} -> {})",
                destination.display(),
                FileManager::format_size(outcome.original_size),
                FileManager::format_size(outcome.final_size)
            );
            return Ok(report);
        }

        report.final_path = Some(FileManager::persist(outcome, &destination)?);
        Ok(report)
    }
}
