//! # Optimizer Module
//!
//! Livello applicativo che separa le responsabilità in sottomoduli:
//! - `media_optimizer`: Orchestratore principale del run
//! - `task_optimizer`: Worker per singoli file
//! - `path_resolver`: Calcolo del path finale con guardia sulle collisioni

pub mod media_optimizer;
pub mod path_resolver;
pub mod task_optimizer;

pub use media_optimizer::MediaOptimizer;
pub use path_resolver::PathResolver;
pub use task_optimizer::{FileReport, TaskOptimizer};
