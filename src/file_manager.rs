//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei media e la persistenza dei risultati.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva e lazy dei file media (`walkdir`)
//! - Filtro per budget: i file già entro soglia non vengono mai proposti
//! - Persistenza atomica: file temporaneo nella stessa directory + rename
//! - Utilità per calcoli dimensioni e percentuali
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **Immagini**: JPG, JPEG, PNG, WebP, BMP, TIF, TIFF
//! - **Animazioni**: GIF
//! - **Video**: MP4, MOV, MKV
//!
//! ## Sicurezza operazioni:
//! - L'originale viene sostituito solo da un rename atomico riuscito
//! - Un errore prima del rename lascia l'originale intatto
//! - Il file scritto eredita i permessi dell'originale
//! - Solo i temporanei `.shrink-*` sono ignorati dalla discovery, gli altri dotfile no
//!
//! ## Esempio:
//! ```ignore
//! for candidate in FileManager::discover(&root, config.budgets) {
//!     println!("{} ({})", candidate.path.display(), FileManager::format_size(candidate.size));
//! }
//! ```

use crate::config::SizeBudget;
use crate::error::{CompressError, Result};
use crate::format::MediaFormat;
use crate::outcome::{CompressionOutcome, Payload};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name prefix of every temporary file the tool stages next to a target
pub const STAGING_PREFIX: &str = ".shrink-";
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A file over its budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub format: MediaFormat,
}

/// Lazy walk yielding only over-budget media files.
/// Calling `FileManager::discover` again restarts from the root.
pub struct Discovery {
    walker: walkdir::IntoIter,
    budgets: SizeBudget,
}

impl Iterator for Discovery {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || is_staging_file(entry.path()) {
                continue;
            }
            let Some(format) = MediaFormat::from_path(entry.path()) else {
                continue;
            };
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if size <= self.budgets.for_kind(format.kind()) {
                debug!("Within budget, skipping {}", entry.path().display());
                continue;
            }
            return Some(Candidate {
                path: entry.into_path(),
                size,
                format,
            });
        }
    }
}

fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(STAGING_PREFIX))
        .unwrap_or(false)
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Over-budget media under `root` (or `root` itself when it is a file)
    pub fn discover(root: &Path, budgets: SizeBudget) -> Discovery {
        Discovery {
            walker: WalkDir::new(root).sort_by_file_name().into_iter(),
            budgets,
        }
    }

    /// Writes the outcome to `destination` atomically and removes the
    /// source when the outcome asks for it. Returns the final path.
    pub fn persist(outcome: CompressionOutcome, destination: &Path) -> Result<PathBuf> {
        let CompressionOutcome {
            source,
            payload,
            delete_original,
            ..
        } = outcome;

        let staged = match payload {
            Payload::Bytes(bytes) => {
                let mut staged = tempfile::Builder::new()
                    .prefix(STAGING_PREFIX)
                    .tempfile_in(parent_dir(destination))
                    .map_err(|e| CompressError::persistence(destination, e))?;
                staged
                    .write_all(&bytes)
                    .and_then(|_| staged.as_file().sync_all())
                    .map_err(|e| CompressError::persistence(destination, e))?;
                staged
            }
            Payload::Staged(staged) => staged,
        };
        inherit_permissions(&staged, &source, destination)?;
        staged
            .persist(destination)
            .map_err(|e| CompressError::persistence(destination, e.error))?;

        if delete_original && destination != source.as_path() {
            if let Err(e) = std::fs::remove_file(&source) {
                warn!(
                    "Wrote {} but could not remove {}: {}",
                    destination.display(),
                    source.display(),
                    e
                );
            }
        }

        Ok(destination.to_path_buf())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

/// Temp files are created 0600; the result keeps the mode of the file it replaces
fn inherit_permissions(staged: &NamedTempFile, source: &Path, destination: &Path) -> Result<()> {
    let Ok(metadata) = std::fs::metadata(source) else {
        return Ok(());
    };
    staged
        .as_file()
        .set_permissions(metadata.permissions())
        .map_err(|e| CompressError::persistence(destination, e))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
