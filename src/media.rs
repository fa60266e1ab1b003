//! # Media Buffer Module
//!
//! Rappresentazione in memoria di un singolo file durante un run di compressione.
//!
//! ## Responsabilità:
//! - `MediaBuffer`: immagine decodificata, sequenza di frame o handle di un video
//! - Decodifica una sola volta dal disco (nessuna rilettura per ogni probe)
//! - Applica l'orientamento EXIF ai pixel prima di qualsiasi encode
//! - Rilevamento canale alpha per la format policy
//!
//! Il buffer appartiene esclusivamente al run che lo ha creato e non viene
//! mai condiviso tra file diversi.

use crate::error::{CompressError, Result};
use crate::format::{MediaFormat, MediaKind};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Decoded content of one media file
pub enum MediaBuffer {
    /// Single raster image plus the format actually found in the bytes
    Still {
        image: DynamicImage,
        detected: Option<MediaFormat>,
    },
    /// Frame sequence of an animated raster
    Animated(Vec<Frame>),
    /// Video container, left on disk and handed to the external encoder
    Clip(PathBuf),
}

impl MediaBuffer {
    /// Decodes `path` according to the kind of `format`.
    pub fn load(path: &Path, format: MediaFormat) -> Result<Self> {
        match format.kind() {
            MediaKind::Image => Self::load_still(path),
            MediaKind::Animated => Self::load_frames(path),
            MediaKind::Video => {
                if !path.is_file() {
                    return Err(CompressError::Decode(format!(
                        "video not found: {}",
                        path.display()
                    )));
                }
                Ok(MediaBuffer::Clip(path.to_path_buf()))
            }
        }
    }

    fn load_still(path: &Path) -> Result<Self> {
        let reader = ImageReader::open(path)?
            .with_guessed_format()
            .map_err(|e| CompressError::Decode(format!("{}: {}", path.display(), e)))?;
        let detected = reader.format().and_then(MediaFormat::from_image_format);
        let decode_failure = |e: image::ImageError| CompressError::Decode(format!("{}: {}", path.display(), e));

        let mut decoder = reader.into_decoder().map_err(decode_failure)?;
        // Encoders write no EXIF, so the rotation is baked into the pixels
        let orientation = decoder.orientation().map_err(decode_failure)?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(decode_failure)?;
        image.apply_orientation(orientation);
        Ok(MediaBuffer::Still { image, detected })
    }

    fn load_frames(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .map_err(|e| CompressError::Decode(format!("{}: {}", path.display(), e)))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| CompressError::Decode(format!("{}: {}", path.display(), e)))?;
        if frames.is_empty() {
            return Err(CompressError::Decode(format!(
                "{}: animation has no frames",
                path.display()
            )));
        }
        Ok(MediaBuffer::Animated(frames))
    }
}

/// Whether the color model carries an alpha channel.
/// An RGBA image counts even when every pixel is opaque.
pub fn has_alpha(image: &DynamicImage) -> bool {
    image.color().has_alpha()
}

/// Drops alpha for containers that cannot store it
pub fn flatten_to_rgb(image: &DynamicImage) -> DynamicImage {
    if has_alpha(image) {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    /// APP1 segment with a single Orientation tag (big-endian TIFF)
    fn exif_orientation_segment(orientation: u8) -> Vec<u8> {
        let mut segment = vec![0xFF, 0xE1, 0x00, 0x22];
        segment.extend_from_slice(b"Exif\0\0");
        segment.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
        segment.extend_from_slice(&[0x00, 0x01]);
        segment.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        segment.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        segment
    }

    fn jpeg_with_orientation(path: &Path, width: u32, height: u32, orientation: u8) {
        let mut plain = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 160, 30])))
            .write_to(&mut plain, image::ImageFormat::Jpeg)
            .unwrap();
        let plain = plain.into_inner();

        let mut bytes = plain[..2].to_vec();
        bytes.extend(exif_orientation_segment(orientation));
        bytes.extend_from_slice(&plain[2..]);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_exif_rotation_is_applied_to_pixels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portrait.jpg");
        jpeg_with_orientation(&path, 40, 20, 6);

        match MediaBuffer::load(&path, MediaFormat::Jpeg).unwrap() {
            MediaBuffer::Still { image, .. } => assert_eq!(image.dimensions(), (20, 40)),
            _ => panic!("expected a still image"),
        }
    }

    #[test]
    fn test_upright_exif_keeps_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landscape.jpg");
        jpeg_with_orientation(&path, 40, 20, 1);

        match MediaBuffer::load(&path, MediaFormat::Jpeg).unwrap() {
            MediaBuffer::Still { image, .. } => assert_eq!(image.dimensions(), (40, 20)),
            _ => panic!("expected a still image"),
        }
    }

    #[test]
    fn test_has_alpha() {
        assert!(has_alpha(&DynamicImage::new_rgba8(2, 2)));
        assert!(!has_alpha(&DynamicImage::new_rgb8(2, 2)));
        assert!(has_alpha(&DynamicImage::new_luma_a8(2, 2)));
    }

    #[test]
    fn test_flatten_drops_alpha() {
        let flat = flatten_to_rgb(&DynamicImage::new_rgba8(3, 2));
        assert!(!has_alpha(&flat));
        assert_eq!(flat.dimensions(), (3, 2));
    }

    #[test]
    fn test_load_still_detects_real_format() {
        let dir = TempDir::new().unwrap();
        // PNG bytes behind a .bmp extension
        let path = dir.path().join("disguised.bmp");
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 128]));
        img.save_with_format(&path, image::ImageFormat::Png).unwrap();

        let buffer = MediaBuffer::load(&path, MediaFormat::Bmp).unwrap();
        match buffer {
            MediaBuffer::Still { image, detected } => {
                assert_eq!(detected, Some(MediaFormat::Png));
                assert!(has_alpha(&image));
            }
            _ => panic!("expected a still image"),
        }
    }

    #[test]
    fn test_load_corrupt_image_is_decode_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = MediaBuffer::load(&path, MediaFormat::Jpeg);
        assert!(matches!(result, Err(CompressError::Decode(_))));
    }

    #[test]
    fn test_missing_video_is_decode_failure() {
        let result = MediaBuffer::load(Path::new("/nonexistent/clip.mp4"), MediaFormat::Mp4);
        assert!(matches!(result, Err(CompressError::Decode(_))));
    }
}
