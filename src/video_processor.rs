//! # Video Processing Module
//!
//! Questo modulo gestisce la compressione dei container video tramite FFmpeg.
//!
//! ## Responsabilità:
//! - Rampa CRF ascendente (default 28 → 40, passo 2) fino al budget
//! - Ogni probe scrive un file temporaneo nascosto nella stessa directory
//!   del sorgente, così il replace finale è un rename atomico
//! - Timeout per probe: allo scadere il processo ffmpeg viene terminato
//! - Ricodifica audio AAC con bitrate configurabile
//! - Preservazione metadata con `-map_metadata 0`
//!
//! ## Pipeline:
//! 1. Per ogni CRF della rampa: `ffmpeg -i src -c:v libx264 -preset P -crf N ...`
//! 2. Misura la dimensione del temporaneo
//! 3. Il primo risultato entro budget vince; altrimenti resta quello al CRF massimo
//! 4. Il temporaneo vincente viene restituito come `Payload::Staged`
//!
//! ## Controllo qualità (CRF):
//! - 18-23: Alta qualità
//! - 24-28: Buona qualità (punto di partenza)
//! - 29-35: Qualità accettabile
//! - 36+: Bassa qualità (solo come best effort)

use crate::error::{CompressError, Result};
use crate::file_manager::STAGING_PREFIX;
use crate::format::MediaFormat;
use crate::outcome::{CompressionOutcome, Payload};
use crate::platform::PlatformCommands;
use crate::search::Ramp;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::debug;

/// Highest CRF libx264 accepts
pub const MAX_X264_CRF: u8 = 51;

/// CRF ramp and codec knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub initial_crf: u8,
    pub crf_step: u8,
    pub max_crf: u8,
    /// libx264 preset
    pub preset: String,
    /// AAC bitrate, e.g. `96k`
    pub audio_bitrate: String,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            initial_crf: 28,
            crf_step: 2,
            max_crf: 40,
            preset: "veryfast".to_string(),
            audio_bitrate: "96k".to_string(),
        }
    }
}

impl VideoSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_crf > MAX_X264_CRF {
            return Err(CompressError::Validation(format!(
                "CRF cap must be at most {}",
                MAX_X264_CRF
            )));
        }
        if self.preset.trim().is_empty() || self.audio_bitrate.trim().is_empty() {
            return Err(CompressError::Validation(
                "video preset and audio bitrate must not be empty".to_string(),
            ));
        }
        self.ramp().map(|_| ())
    }

    fn ramp(&self) -> Result<Ramp> {
        Ramp::ascending(self.initial_crf, self.max_crf, self.crf_step)
    }
}

/// Handles video compression through an external ffmpeg process
#[derive(Debug, Clone)]
pub struct VideoProcessor {
    settings: VideoSettings,
    budget: u64,
    probe_timeout: Duration,
    program: OsString,
    leading_args: Vec<OsString>,
}

impl VideoProcessor {
    pub fn new(settings: VideoSettings, budget: u64, probe_timeout: Duration) -> Self {
        let program = PlatformCommands::instance().get_command("ffmpeg");
        Self {
            settings,
            budget,
            probe_timeout,
            program: OsString::from(program),
            leading_args: Vec::new(),
        }
    }

    /// Runs the encoder through another program (a wrapper or a script),
    /// passing `leading_args` before the ffmpeg arguments.
    pub fn with_program(mut self, program: impl Into<OsString>, leading_args: Vec<OsString>) -> Self {
        self.program = program.into();
        self.leading_args = leading_args;
        self
    }

    /// ffmpeg arguments for one probe
    pub fn build_args(&self, input: &Path, output: &Path, crf: u8) -> Vec<OsString> {
        let loglevel = if tracing::enabled!(tracing::Level::DEBUG) {
            "info"
        } else {
            "warning"
        };
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", loglevel, "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_os_string());
        args.extend(
            [
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                self.settings.preset.clone(),
                "-crf".to_string(),
                crf.to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                self.settings.audio_bitrate.clone(),
                "-map_metadata".to_string(),
                "0".to_string(),
                "-y".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_os_string());
        args
    }

    /// Walks the CRF ramp and returns the first result within budget, or the
    /// one at the CRF cap.
    pub async fn compress(
        &self,
        source: &Path,
        format: MediaFormat,
        original_size: u64,
    ) -> Result<CompressionOutcome> {
        self.run(source, format, original_size)
            .await
            .map_err(CompressError::into_run_failure)
    }

    async fn run(&self, source: &Path, format: MediaFormat, original_size: u64) -> Result<CompressionOutcome> {
        let mut best: Option<(NamedTempFile, u64, u8)> = None;

        for crf in self.settings.ramp()? {
            let staged = self.probe(source, format, crf).await?;
            let size = tokio::fs::metadata(staged.path()).await?.len();
            debug!(
                "Video probe {} crf={} -> {} bytes (budget {})",
                source.display(),
                crf,
                size,
                self.budget
            );
            // Replacing `best` drops and deletes the previous temporary file
            best = Some((staged, size, crf));
            if size <= self.budget {
                break;
            }
        }

        let (staged, size, crf) = best.ok_or_else(|| {
            CompressError::CompressionFailed("CRF ramp produced no probe".to_string())
        })?;

        Ok(CompressionOutcome {
            source: source.to_path_buf(),
            source_format: format,
            original_size,
            payload: Payload::Staged(staged),
            final_size: size,
            final_format: format,
            final_scale: 1.0,
            final_quality: Some(crf),
            format_changed: false,
            delete_original: false,
            met_budget: size <= self.budget,
        })
    }

    async fn probe(&self, source: &Path, format: MediaFormat, crf: u8) -> Result<NamedTempFile> {
        let parent = source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(&format!(".tmp.{}", format.extension()))
            .tempfile_in(parent)?;

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(self.build_args(source, staged.path(), crf))
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let start_time = Instant::now();
        let output = tokio::time::timeout(self.probe_timeout, cmd.output())
            .await
            .map_err(|_| CompressError::EncodeTimeout(self.probe_timeout))?
            .map_err(|e| {
                CompressError::Encode(format!(
                    "failed to execute {}: {}",
                    self.program.to_string_lossy(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(CompressError::Encode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("Probe finished in {:.1}s", start_time.elapsed().as_secs_f64());
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Stand-in encoder: output size shrinks as the CRF grows
    const FAKE_FFMPEG: &str = r#"
prev=""
crf=0
out=""
for arg in "$@"; do
  if [ "$prev" = "-crf" ]; then crf=$arg; fi
  prev=$arg
  out=$arg
done
head -c $(( (60 - crf) * 100 )) /dev/zero > "$out"
"#;

    fn processor(dir: &TempDir, script: &str, budget: u64, timeout: Duration) -> VideoProcessor {
        let script_path = dir.path().join("fake-ffmpeg.sh");
        std::fs::write(&script_path, script).unwrap();
        VideoProcessor::new(VideoSettings::default(), budget, timeout)
            .with_program("sh", vec![script_path.into_os_string()])
    }

    fn source_clip(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![1u8; 10_000]).unwrap();
        path
    }

    #[test]
    fn test_build_args() {
        let processor = VideoProcessor::new(VideoSettings::default(), 1, Duration::from_secs(1));
        let args = processor.build_args(Path::new("in.mp4"), Path::new("out.mp4"), 30);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        let crf_at = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf_at + 1], "30");
        let preset_at = args.iter().position(|a| a == "-preset").unwrap();
        assert_eq!(args[preset_at + 1], "veryfast");
        assert!(args.windows(2).any(|w| w[0] == "-b:a" && w[1] == "96k"));
        assert!(args.windows(2).any(|w| w[0] == "-map_metadata" && w[1] == "0"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_settings_validation() {
        assert!(VideoSettings::default().validate().is_ok());
        let inverted = VideoSettings {
            initial_crf: 45,
            max_crf: 40,
            ..VideoSettings::default()
        };
        assert!(inverted.validate().is_err());
        let too_high = VideoSettings {
            max_crf: 60,
            ..VideoSettings::default()
        };
        assert!(too_high.validate().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crf_ramp_stops_within_budget() {
        let dir = TempDir::new().unwrap();
        let source = source_clip(&dir);
        // crf 28 -> 3200, 30 -> 3000, 32 -> 2800
        let processor = processor(&dir, FAKE_FFMPEG, 2_800, Duration::from_secs(30));

        let outcome = processor.compress(&source, MediaFormat::Mp4, 10_000).await.unwrap();
        assert!(outcome.met_budget);
        assert_eq!(outcome.final_quality, Some(32));
        assert_eq!(outcome.final_size, 2_800);
        assert!(matches!(outcome.payload, Payload::Staged(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crf_ramp_best_effort_at_cap() {
        let dir = TempDir::new().unwrap();
        let source = source_clip(&dir);
        let processor = processor(&dir, FAKE_FFMPEG, 100, Duration::from_secs(30));

        let outcome = processor.compress(&source, MediaFormat::Mp4, 10_000).await.unwrap();
        assert!(!outcome.met_budget);
        assert_eq!(outcome.final_quality, Some(40));
        assert_eq!(outcome.final_size, 2_000);

        // Only the winning temporary file is left next to the source
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_encoder_is_compression_failure() {
        let dir = TempDir::new().unwrap();
        let source = source_clip(&dir);
        let processor = processor(&dir, "echo broken >&2; exit 1", 1_000, Duration::from_secs(30));

        let result = processor.compress(&source, MediaFormat::Mp4, 10_000).await;
        assert!(matches!(result, Err(CompressError::CompressionFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_timeout() {
        let dir = TempDir::new().unwrap();
        let source = source_clip(&dir);
        let processor = processor(&dir, "sleep 5", 1_000, Duration::from_millis(100));

        let result = processor.compress(&source, MediaFormat::Mp4, 10_000).await;
        assert!(matches!(result, Err(CompressError::EncodeTimeout(_))));
    }
}
