//! # Path Resolution Module
//!
//! Centralizza il calcolo del path finale di un risultato.
//! Quando il formato cambia, il nuovo nome non sovrascrive mai un file
//! esistente non correlato: `foto.png` → `foto.jpg`, oppure `foto_1.jpg`
//! se `foto.jpg` esiste già.

use crate::error::{CompressError, Result};
use crate::format::MediaFormat;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound on `_N` suffixes tried before giving up
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Final path for a result in `format` produced from `source`
    pub fn destination_for(source: &Path, format: MediaFormat) -> Result<PathBuf> {
        let same_extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format.matches_extension(ext))
            .unwrap_or(false);
        if same_extension {
            return Ok(source.to_path_buf());
        }

        let stem = source
            .file_stem()
            .ok_or_else(|| CompressError::persistence(source, "file has no name"))?
            .to_string_lossy();
        let extension = format.extension();

        let candidate = source.with_file_name(format!("{}.{}", stem, extension));
        if !candidate.exists() {
            return Ok(candidate);
        }

        for suffix in 1..=MAX_COLLISION_SUFFIX {
            let candidate = source.with_file_name(format!("{}_{}.{}", stem, suffix, extension));
            if !candidate.exists() {
                debug!(
                    "{}.{} already exists, using {}",
                    stem,
                    extension,
                    candidate.display()
                );
                return Ok(candidate);
            }
        }

        Err(CompressError::persistence(
            source,
            format!("no free name for {}.{}", stem, extension),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_format_keeps_path() {
        let path = Path::new("/photos/holiday.JPEG");
        assert_eq!(
            PathResolver::destination_for(path, MediaFormat::Jpeg).unwrap(),
            PathBuf::from("/photos/holiday.JPEG")
        );
    }

    #[test]
    fn test_new_format_changes_extension() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("logo.png");
        assert_eq!(
            PathResolver::destination_for(&source, MediaFormat::WebP).unwrap(),
            dir.path().join("logo.webp")
        );
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.png");
        std::fs::write(dir.path().join("photo.jpg"), b"unrelated").unwrap();
        std::fs::write(dir.path().join("photo_1.jpg"), b"unrelated too").unwrap();

        assert_eq!(
            PathResolver::destination_for(&source, MediaFormat::Jpeg).unwrap(),
            dir.path().join("photo_2.jpg")
        );
    }
}
