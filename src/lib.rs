//! # Space Media Shrinker Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! Riduce immagini, animazioni e video sotto una soglia in byte per tipo di
//! media, sacrificando il meno possibile in qualità: prima si abbassa la
//! quality, poi la risoluzione, e il container cambia solo quando la policy
//! del formato lo prevede.
//!
//! ## Architettura dei moduli:
//! - `format`: Formati supportati e relative capacità
//! - `media`: Buffer decodificato di un singolo file
//! - `encoder`: Encode probe in memoria e resampler
//! - `search`: Rampe di quality/CRF e passi di downscale
//! - `compressor`: Macchina a stati della ricerca progressiva
//! - `policy`: Tabella di decisione per formato e catene di fallback
//! - `animation`: Quality proxy per le GIF
//! - `video_processor`: Rampa CRF con FFmpeg
//! - `outcome`: Risultato terminale di un run
//! - `file_manager`: Discovery e persistenza atomica
//! - `optimizer`: Orchestratore del run e worker per file
//! - `config`, `error`, `platform`, `progress`, `json_output`: supporto
//!
//! ## Utilizzo:
//! ```ignore
//! use space_media_shrinker::{Config, MediaOptimizer};
//!
//! let config = Config::default();
//! let stats = MediaOptimizer::new(config)?.run(&path).await?;
//! ```

pub mod animation;
pub mod compressor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod format;
pub mod json_output;
pub mod media;
pub mod optimizer;
pub mod outcome;
pub mod platform;
pub mod policy;
pub mod progress;
pub mod search;
pub mod video_processor;

pub use compressor::{ProgressiveCompressor, SearchParams, SearchResult};
pub use config::{Config, SizeBudget};
pub use encoder::{EncodeConfig, EncodeFlags, Encoder, ImageCodec, LanczosResampler, ProbeResult, Resampler};
pub use error::CompressError;
pub use format::{MediaFormat, MediaKind};
pub use optimizer::MediaOptimizer;
pub use outcome::{CompressionOutcome, OutcomeStatus};
pub use progress::RunStats;
