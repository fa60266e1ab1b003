//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con budget e parametri di ricerca
//! - Fornisce validazione dei parametri prima di ogni run
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//! - Parsing delle dimensioni in byte (`1MiB`, `500KB`, `3145728`)
//!
//! ## Parametri di configurazione:
//! - `budgets`: Soglia in byte per tipo di media (default: 1 MiB immagini, 3 MiB animazioni e video)
//! - `search`: Rampa quality e downscale per immagini (default: 95 → 20, passo 5, ratio 0.9, give-up 10)
//! - `policy`: Conversione alpha permessa, effort PNG, method WebP (default: true, 6, 6)
//! - `animated`: Rampa quality proxy GIF (default: 80 → 10, passo 10)
//! - `video`: Rampa CRF, preset e bitrate audio (default: 28 → 40, passo 2, veryfast, 96k)
//! - `probe_timeout_secs`: Timeout per singolo probe ffmpeg (default: 600)
//! - `dry_run`: Ricerca completa senza scrivere nulla (default: false)
//! - `json_output`: Output strutturato JSON invece della progress bar (default: false)
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     budgets: SizeBudget { image: 512 * 1024, ..Default::default() },
//!     dry_run: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::animation::AnimatedSettings;
use crate::compressor::SearchParams;
use crate::format::MediaKind;
use crate::policy::PolicyOptions;
use crate::video_processor::VideoSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;

/// Byte ceiling per media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeBudget {
    pub image: u64,
    pub animated: u64,
    pub video: u64,
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self {
            image: MIB,
            animated: 3 * MIB,
            video: 3 * MIB,
        }
    }
}

impl SizeBudget {
    pub fn for_kind(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.image,
            MediaKind::Animated => self.animated,
            MediaKind::Video => self.video,
        }
    }
}

/// Configuration for one shrink run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub budgets: SizeBudget,
    /// Still image quality/resolution search
    pub search: SearchParams,
    pub policy: PolicyOptions,
    pub animated: AnimatedSettings,
    pub video: VideoSettings,
    /// Per-probe limit for the external video encoder
    pub probe_timeout_secs: u64,
    /// Run the full search but never touch the files
    pub dry_run: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            budgets: SizeBudget::default(),
            search: SearchParams::default(),
            policy: PolicyOptions::default(),
            animated: AnimatedSettings::default(),
            video: VideoSettings::default(),
            probe_timeout_secs: 600,
            dry_run: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.budgets.image == 0 || self.budgets.animated == 0 || self.budgets.video == 0 {
            return Err(anyhow::anyhow!("Size budgets must be greater than 0"));
        }

        self.search.validate()?;
        self.animated.validate()?;
        self.video.validate()?;

        if self.policy.png_effort > 6 {
            return Err(anyhow::anyhow!("PNG effort must be between 0 and 6"));
        }

        if self.policy.webp_method > 6 {
            return Err(anyhow::anyhow!("WebP method must be between 0 and 6"));
        }

        if self.probe_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Probe timeout must be greater than 0"));
        }

        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Load configuration from file, falling back to defaults when it is absent
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Parses `3145728`, `500KB` (decimal) or `1MiB` (binary) into bytes.
pub fn parse_byte_size(input: &str) -> std::result::Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{}'", input))?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "kib" => 1024,
        "m" | "mb" => 1_000_000,
        "mib" => MIB,
        "g" | "gb" => 1_000_000_000,
        "gib" => 1024 * MIB,
        other => return Err(format!("unknown size unit '{}'", other)),
    };

    let bytes = (value * multiplier as f64).round();
    if !bytes.is_finite() || bytes < 1.0 {
        return Err(format!("size '{}' must be at least one byte", input));
    }
    Ok(bytes as u64)
}
