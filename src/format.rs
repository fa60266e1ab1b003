//! # Media Format Module
//!
//! Insieme chiuso dei formati supportati, ciascuno con le proprie capacità
//! espresse come dati invece che come catene di `if` sulle estensioni.
//!
//! ## Responsabilità:
//! - `MediaFormat`: enum dei container riconosciuti (immagini, animazioni, video)
//! - `Capabilities`: supporto quality e alpha per ogni formato
//! - `FormatFamily`: la riga della tabella di policy a cui appartiene il formato
//! - Mapping da/verso estensioni e `image::ImageFormat`
//!
//! ## Tabella capacità:
//! | Formato | Quality | Alpha | Famiglia |
//! |---------|---------|-------|----------|
//! | JPEG    | ✅      | ❌    | Lossy    |
//! | WebP    | ✅      | ✅    | Lossy    |
//! | PNG     | ❌      | ✅    | Lossless |
//! | GIF     | proxy   | ✅    | Animated |
//! | BMP/TIFF| ❌      | ✅    | Other    |
//! | MP4/MOV/MKV | CRF | ❌    | Video    |
//!
//! La colonna Alpha decide se un'immagine va appiattita prima di passare a quel formato.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Closed set of containers the shrinker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
    Bmp,
    Tiff,
    Mp4,
    Mov,
    Mkv,
}

/// Which budget applies to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Animated,
    Video,
}

/// Row of the format policy table a source format falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    LossyRaster,
    LosslessRaster,
    AnimatedRaster,
    Video,
    Other,
}

/// Capability set carried by every format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Encoder accepts a quality parameter
    pub quality: bool,
    /// Container can carry an alpha channel
    pub alpha: bool,
    pub family: FormatFamily,
    pub kind: MediaKind,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 9] = [
        MediaFormat::Jpeg,
        MediaFormat::Png,
        MediaFormat::WebP,
        MediaFormat::Gif,
        MediaFormat::Bmp,
        MediaFormat::Tiff,
        MediaFormat::Mp4,
        MediaFormat::Mov,
        MediaFormat::Mkv,
    ];

    pub const fn capabilities(self) -> Capabilities {
        use FormatFamily::*;
        use MediaKind::*;
        let (quality, alpha, family, kind) = match self {
            MediaFormat::Jpeg => (true, false, LossyRaster, Image),
            MediaFormat::WebP => (true, true, LossyRaster, Image),
            MediaFormat::Png => (false, true, LosslessRaster, Image),
            MediaFormat::Gif => (false, true, AnimatedRaster, Animated),
            MediaFormat::Bmp | MediaFormat::Tiff => (false, true, Other, Image),
            MediaFormat::Mp4 | MediaFormat::Mov | MediaFormat::Mkv => {
                (false, false, FormatFamily::Video, MediaKind::Video)
            }
        };
        Capabilities {
            quality,
            alpha,
            family,
            kind,
        }
    }

    pub fn kind(self) -> MediaKind {
        self.capabilities().kind
    }

    pub fn supports_quality(self) -> bool {
        self.capabilities().quality
    }

    /// Canonical extension used when a file is written in this format
    pub fn extension(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpg",
            MediaFormat::Png => "png",
            MediaFormat::WebP => "webp",
            MediaFormat::Gif => "gif",
            MediaFormat::Bmp => "bmp",
            MediaFormat::Tiff => "tiff",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mov => "mov",
            MediaFormat::Mkv => "mkv",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaFormat::Jpeg),
            "png" => Some(MediaFormat::Png),
            "webp" => Some(MediaFormat::WebP),
            "gif" => Some(MediaFormat::Gif),
            "bmp" => Some(MediaFormat::Bmp),
            "tif" | "tiff" => Some(MediaFormat::Tiff),
            "mp4" => Some(MediaFormat::Mp4),
            "mov" => Some(MediaFormat::Mov),
            "mkv" => Some(MediaFormat::Mkv),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether `extension` already names this format (`jpeg` counts as JPEG)
    pub fn matches_extension(self, extension: &str) -> bool {
        Self::from_extension(extension) == Some(self)
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(MediaFormat::Jpeg),
            ImageFormat::Png => Some(MediaFormat::Png),
            ImageFormat::WebP => Some(MediaFormat::WebP),
            ImageFormat::Gif => Some(MediaFormat::Gif),
            ImageFormat::Bmp => Some(MediaFormat::Bmp),
            ImageFormat::Tiff => Some(MediaFormat::Tiff),
            _ => None,
        }
    }

    pub fn to_image_format(self) -> Option<ImageFormat> {
        match self {
            MediaFormat::Jpeg => Some(ImageFormat::Jpeg),
            MediaFormat::Png => Some(ImageFormat::Png),
            MediaFormat::WebP => Some(ImageFormat::WebP),
            MediaFormat::Gif => Some(ImageFormat::Gif),
            MediaFormat::Bmp => Some(ImageFormat::Bmp),
            MediaFormat::Tiff => Some(ImageFormat::Tiff),
            MediaFormat::Mp4 | MediaFormat::Mov | MediaFormat::Mkv => None,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaFormat::Jpeg => "JPEG",
            MediaFormat::Png => "PNG",
            MediaFormat::WebP => "WebP",
            MediaFormat::Gif => "GIF",
            MediaFormat::Bmp => "BMP",
            MediaFormat::Tiff => "TIFF",
            MediaFormat::Mp4 => "MP4",
            MediaFormat::Mov => "MOV",
            MediaFormat::Mkv => "MKV",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_is_case_insensitive() {
        assert_eq!(MediaFormat::from_extension("JPEG"), Some(MediaFormat::Jpeg));
        assert_eq!(MediaFormat::from_extension("Png"), Some(MediaFormat::Png));
        assert_eq!(MediaFormat::from_extension("tif"), Some(MediaFormat::Tiff));
        assert_eq!(MediaFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_extension_round_trips_through_from_extension() {
        for format in MediaFormat::ALL {
            assert_eq!(MediaFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_capability_table() {
        assert!(MediaFormat::Jpeg.supports_quality());
        assert!(!MediaFormat::Jpeg.capabilities().alpha);
        assert!(MediaFormat::WebP.capabilities().alpha);
        assert!(!MediaFormat::Png.supports_quality());
        assert_eq!(MediaFormat::Png.capabilities().family, FormatFamily::LosslessRaster);
        assert_eq!(MediaFormat::Gif.kind(), MediaKind::Animated);
        assert_eq!(MediaFormat::Mkv.kind(), MediaKind::Video);
        assert_eq!(MediaFormat::Bmp.capabilities().family, FormatFamily::Other);
    }

    #[test]
    fn test_matches_extension_accepts_aliases() {
        assert!(MediaFormat::Jpeg.matches_extension("jpeg"));
        assert!(MediaFormat::Jpeg.matches_extension("JPG"));
        assert!(!MediaFormat::Jpeg.matches_extension("png"));
    }

    #[test]
    fn test_video_formats_have_no_image_format() {
        assert_eq!(MediaFormat::Mp4.to_image_format(), None);
        assert_eq!(
            MediaFormat::from_image_format(ImageFormat::WebP),
            Some(MediaFormat::WebP)
        );
    }
}
