//! # Space Media Shrinker - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione da file e override da CLI
//! - Avvio del `MediaOptimizer`
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (path, budget, quality minima, flag)
//! 2. Configura il logging (`RUST_LOG`, altrimenti INFO o DEBUG con `--verbose`)
//! 3. Carica `--config` se presente, poi applica gli override
//! 4. Valida la configurazione e avvia il run
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-shrinker /path/to/media --image-budget 1MiB --video-budget 3MiB --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use space_media_shrinker::config::parse_byte_size;
use space_media_shrinker::platform::PlatformCommands;
use space_media_shrinker::{Config, MediaOptimizer};

#[derive(Parser)]
#[command(name = "media-shrinker")]
#[command(version, about = "Shrink images, animations and videos below a byte budget")]
struct Args {
    /// Directory (or single file) to shrink
    media_path: PathBuf,

    /// JSON configuration file; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Byte budget for still images (e.g. 1MiB, 800KB)
    #[arg(long, value_parser = parse_byte_size)]
    image_budget: Option<u64>,

    /// Byte budget for animated images
    #[arg(long, value_parser = parse_byte_size)]
    animated_budget: Option<u64>,

    /// Byte budget for videos
    #[arg(long, value_parser = parse_byte_size)]
    video_budget: Option<u64>,

    /// Lowest image quality ever tried (1-100)
    #[arg(long)]
    min_quality: Option<u8>,

    /// Keep transparent PNGs as PNG even when they stay over budget
    #[arg(long)]
    no_alpha_conversion: bool,

    /// Per-probe timeout for the video encoder, in seconds
    #[arg(long)]
    probe_timeout: Option<u64>,

    /// Dry run - search and report, never write
    #[arg(long)]
    dry_run: bool,

    /// Output progress and status as JSON lines
    #[arg(long)]
    json: bool,

    /// Write the effective configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(budget) = self.image_budget {
            config.budgets.image = budget;
        }
        if let Some(budget) = self.animated_budget {
            config.budgets.animated = budget;
        }
        if let Some(budget) = self.video_budget {
            config.budgets.video = budget;
        }
        if let Some(quality) = self.min_quality {
            config.search.min_quality = quality;
        }
        if let Some(seconds) = self.probe_timeout {
            config.probe_timeout_secs = seconds;
        }
        if self.no_alpha_conversion {
            config.policy.allow_alpha_conversion = false;
        }
        config.dry_run |= self.dry_run;
        config.json_output |= self.json;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; in JSON mode stdout belongs to the message stream
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    debug!("Running on {}", PlatformCommands::system_info());

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    if let Some(path) = &args.save_config {
        config.save_to_file(path).await?;
        info!("Saved configuration to {}", path.display());
    }

    let stats = MediaOptimizer::new(config)?.run(&args.media_path).await?;
    if stats.errors > 0 {
        info!("{} file(s) failed; originals were left untouched", stats.errors);
    }

    Ok(())
}
