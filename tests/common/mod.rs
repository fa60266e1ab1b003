#![allow(dead_code)]

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use space_media_shrinker::error::{CompressError, Result};
use space_media_shrinker::{EncodeConfig, Encoder, MediaFormat, ProbeResult};
use std::path::Path;

/// Deterministic stand-in for the real codecs.
///
/// Sizes depend only on pixel count, quality and format; the first byte of
/// every payload records whether the encoded buffer carried alpha.
pub struct FakeEncoder {
    /// Fixed cost added to every PNG, to model files lossless scaling can't fix
    pub png_overhead: u64,
    pub fail_on: Option<MediaFormat>,
}

impl Default for FakeEncoder {
    fn default() -> Self {
        Self {
            png_overhead: 64,
            fail_on: None,
        }
    }
}

impl Encoder<DynamicImage> for FakeEncoder {
    fn encode(&self, image: &DynamicImage, config: &EncodeConfig) -> Result<ProbeResult> {
        if self.fail_on == Some(config.format) {
            return Err(CompressError::Encode(format!("{} encoder crashed", config.format)));
        }
        let (width, height) = image.dimensions();
        let pixels = u64::from(width) * u64::from(height);
        let quality = u64::from(config.quality.unwrap_or(100));
        let size = match config.format {
            MediaFormat::Jpeg => pixels * quality / 100 + 16,
            MediaFormat::WebP => pixels * quality / 200 + 16,
            MediaFormat::Png => pixels * 4 + self.png_overhead,
            _ => pixels * 3 + 54,
        };
        let mut bytes = vec![0u8; size as usize];
        bytes[0] = u8::from(image.color().has_alpha());
        Ok(ProbeResult::new(bytes))
    }
}

pub fn gradient_rgba(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, (x % 200) as u8])
    }))
}

/// Pseudo-random pixels that neither PNG nor JPEG compress well
pub fn noise_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)).wrapping_mul(2_654_435_761);
        Rgb([(v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
    })
}

pub fn write_noise_png(path: &Path, size: u32) -> u64 {
    noise_rgb(size, size)
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
    std::fs::metadata(path).unwrap().len()
}

pub fn write_noise_jpeg(path: &Path, size: u32) -> u64 {
    noise_rgb(size, size)
        .save_with_format(path, ImageFormat::Jpeg)
        .unwrap();
    std::fs::metadata(path).unwrap().len()
}
