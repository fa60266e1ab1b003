//! # Encode Probe Module
//!
//! Questo modulo incapsula una singola chiamata all'encoder: dato un buffer in
//! memoria e una `EncodeConfig`, produce i byte codificati senza mai toccare il
//! disco.
//!
//! ## Responsabilità:
//! - `EncodeConfig` / `EncodeFlags`: configurazione immutabile di un probe
//! - `ProbeResult`: byte prodotti e relativa dimensione
//! - Trait `Encoder` e `Resampler`: i contratti consumati dalla ricerca
//! - `ImageCodec`: encoder in-process per JPEG, PNG, WebP, GIF, BMP, TIFF
//! - `LanczosResampler`: ridimensionamento deterministico ad alta qualità
//!
//! ## Backend per formato:
//! | Formato | Backend | Knob |
//! |---------|---------|------|
//! | JPEG    | `mozjpeg` | quality, progressive, Huffman ottimizzato |
//! | PNG     | `image` PngEncoder + `oxipng` | effort (preset oxipng) |
//! | WebP    | `webp` (libwebp) | quality, method, lossless, alpha |
//! | GIF     | `image` GifEncoder | quality proxy per-frame |
//! | BMP/TIFF| `image` | nessuno |
//!
//! `progressive` forza scan progressivi (marker SOF2), `optimize` tabelle
//! Huffman calcolate sull'immagine invece di quelle standard. Senza
//! `progressive` resta lo scan script di default di mozjpeg.

use crate::error::{CompressError, Result};
use crate::format::MediaFormat;
use crate::media::has_alpha;
use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, Frame, ImageEncoder};
use std::io::Cursor;

/// Quality used when a quality-capable format is probed without one
pub const DEFAULT_LOSSY_QUALITY: u8 = 95;

/// Format-specific encoder switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeFlags {
    pub lossless: bool,
    /// Effort / method level (WebP method 0-6, oxipng preset 0-6)
    pub effort: Option<u8>,
    pub progressive: bool,
    pub optimize: bool,
}

/// Immutable configuration of one probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeConfig {
    pub format: MediaFormat,
    pub quality: Option<u8>,
    /// Cumulative scale relative to the source; already applied to the buffer
    pub scale: f64,
    pub flags: EncodeFlags,
}

impl EncodeConfig {
    pub fn new(format: MediaFormat, flags: EncodeFlags) -> Self {
        Self {
            format,
            quality: None,
            scale: 1.0,
            flags,
        }
    }

    pub fn with_quality(self, quality: Option<u8>) -> Self {
        Self { quality, ..self }
    }

    pub fn with_scale(self, scale: f64) -> Self {
        Self { scale, ..self }
    }
}

/// Bytes produced by one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    bytes: Vec<u8>,
}

impl ProbeResult {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encoder capability consumed by the search.
/// Implementations must not write to persistent storage.
pub trait Encoder<B: ?Sized> {
    fn encode(&self, buffer: &B, config: &EncodeConfig) -> Result<ProbeResult>;
}

/// Resampler capability consumed by the resolution search
pub trait Resampler {
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;
}

/// Lanczos3 resampling through the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct LanczosResampler;

impl Resampler for LanczosResampler {
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }
}

/// In-process encoder for every raster format
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl Encoder<DynamicImage> for ImageCodec {
    fn encode(&self, image: &DynamicImage, config: &EncodeConfig) -> Result<ProbeResult> {
        let bytes = match config.format {
            MediaFormat::Jpeg => encode_jpeg(
                image,
                config.quality.unwrap_or(DEFAULT_LOSSY_QUALITY),
                config.flags,
            )?,
            MediaFormat::Png => encode_png(image, config.flags.effort)?,
            MediaFormat::WebP => encode_webp(image, config)?,
            MediaFormat::Gif | MediaFormat::Bmp | MediaFormat::Tiff => {
                encode_with_image_format(image, config.format)?
            }
            MediaFormat::Mp4 | MediaFormat::Mov | MediaFormat::Mkv => {
                return Err(CompressError::UnsupportedFormat(format!(
                    "{} is not a raster format",
                    config.format
                )))
            }
        };
        Ok(ProbeResult::new(bytes))
    }
}

impl Encoder<[Frame]> for ImageCodec {
    /// Re-encodes every frame; `quality` drives the per-frame palette depth
    fn encode(&self, frames: &[Frame], config: &EncodeConfig) -> Result<ProbeResult> {
        if config.format != MediaFormat::Gif {
            return Err(CompressError::UnsupportedFormat(format!(
                "animated {} is not supported",
                config.format
            )));
        }
        let quality = config.quality.unwrap_or(100).clamp(1, 100);
        let levels = posterize_levels(quality);

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, gif_speed(quality));
            encoder.set_repeat(Repeat::Infinite).map_err(encode_failure)?;
            encoder
                .encode_frames(frames.iter().map(|frame| posterize_frame(frame, levels)))
                .map_err(encode_failure)?;
        }
        Ok(ProbeResult::new(bytes))
    }
}

fn encode_failure(err: image::ImageError) -> CompressError {
    CompressError::Encode(err.to_string())
}

fn jpeg_failure(stage: &str, err: std::io::Error) -> CompressError {
    CompressError::Encode(format!("mozjpeg {}: {}", stage, err))
}

fn encode_jpeg(image: &DynamicImage, quality: u8, flags: EncodeFlags) -> Result<Vec<u8>> {
    use mozjpeg::{ColorSpace, Compress};

    let rgb = image.to_rgb8();
    let mut comp = Compress::new(ColorSpace::JCS_RGB);
    comp.set_size(rgb.width() as usize, rgb.height() as usize);
    comp.set_quality(f32::from(quality.clamp(1, 100)));
    comp.set_optimize_coding(flags.optimize);
    if flags.progressive {
        comp.set_progressive_mode();
        comp.set_optimize_scans(flags.optimize);
    }

    let mut comp = comp
        .start_compress(Vec::new())
        .map_err(|e| jpeg_failure("start", e))?;
    comp.write_scanlines(rgb.as_raw())
        .map_err(|e| jpeg_failure("scanlines", e))?;
    comp.finish().map_err(|e| jpeg_failure("finish", e))
}

fn encode_png(image: &DynamicImage, effort: Option<u8>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, PngFilter::Adaptive);
    if has_alpha(image) {
        let rgba = image.to_rgba8();
        encoder
            .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ExtendedColorType::Rgba8)
            .map_err(encode_failure)?;
    } else {
        let rgb = image.to_rgb8();
        encoder
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .map_err(encode_failure)?;
    }

    match effort {
        Some(level) => {
            let options = oxipng::Options::from_preset(level.min(6));
            oxipng::optimize_from_memory(&bytes, &options)
                .map_err(|e| CompressError::Encode(format!("oxipng: {}", e)))
        }
        None => Ok(bytes),
    }
}

fn encode_webp(image: &DynamicImage, config: &EncodeConfig) -> Result<Vec<u8>> {
    let mut webp_config = webp::WebPConfig::new()
        .map_err(|_| CompressError::Encode("libwebp rejected the default configuration".to_string()))?;
    webp_config.lossless = i32::from(config.flags.lossless);
    webp_config.quality = f32::from(config.quality.unwrap_or(DEFAULT_LOSSY_QUALITY).min(100));
    webp_config.method = i32::from(config.flags.effort.unwrap_or(4).min(6));

    let (width, height) = (image.width(), image.height());
    let memory = if has_alpha(image) {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_advanced(&webp_config)
            .map(|m| m.to_vec())
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_advanced(&webp_config)
            .map(|m| m.to_vec())
    };
    memory.map_err(|e| CompressError::Encode(format!("libwebp: {:?}", e)))
}

fn encode_with_image_format(image: &DynamicImage, format: MediaFormat) -> Result<Vec<u8>> {
    let image_format = format
        .to_image_format()
        .ok_or_else(|| CompressError::UnsupportedFormat(format.to_string()))?;
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image_format)
        .map_err(encode_failure)?;
    Ok(cursor.into_inner())
}

/// Channel levels kept per frame: quality 100 keeps all 256
fn posterize_levels(quality: u8) -> u32 {
    (2 + 254 * u32::from(quality) / 100).min(256)
}

/// NeuQuant sampling speed: 1 is the finest palette, 30 the coarsest
fn gif_speed(quality: u8) -> i32 {
    1 + (100 - i32::from(quality)) * 29 / 100
}

fn posterize_frame(frame: &Frame, levels: u32) -> Frame {
    let mut buffer = frame.buffer().clone();
    if levels < 256 {
        for pixel in buffer.pixels_mut() {
            for channel in pixel.0.iter_mut().take(3) {
                *channel = quantize_channel(*channel, levels);
            }
        }
    }
    Frame::from_parts(buffer, frame.left(), frame.top(), frame.delay())
}

fn quantize_channel(value: u8, levels: u32) -> u8 {
    let steps = levels - 1;
    let index = (u32::from(value) * steps + 127) / 255;
    (index * 255 / steps) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Delay, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) * 3 % 256) as u8])
        }))
    }

    #[test]
    fn test_jpeg_probe_decodes_as_jpeg() {
        let config = EncodeConfig::new(MediaFormat::Jpeg, EncodeFlags::default()).with_quality(Some(80));
        let probe = ImageCodec.encode(&gradient(40, 30), &config).unwrap();

        assert_eq!(image::guess_format(probe.bytes()).unwrap(), image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(probe.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_lower_jpeg_quality_is_not_larger() {
        let img = gradient(64, 64);
        let high = EncodeConfig::new(MediaFormat::Jpeg, EncodeFlags::default()).with_quality(Some(95));
        let low = high.with_quality(Some(20));
        let high_size = ImageCodec.encode(&img, &high).unwrap().size();
        let low_size = ImageCodec.encode(&img, &low).unwrap().size();
        assert!(low_size < high_size);
    }

    #[test]
    fn test_jpeg_probe_is_deterministic() {
        let img = gradient(32, 32);
        let config = EncodeConfig::new(MediaFormat::Jpeg, EncodeFlags::default()).with_quality(Some(70));
        let first = ImageCodec.encode(&img, &config).unwrap();
        let second = ImageCodec.encode(&img, &config).unwrap();
        assert_eq!(first, second);
    }

    fn has_marker(bytes: &[u8], marker: u8) -> bool {
        bytes.windows(2).any(|w| w == [0xFF, marker])
    }

    #[test]
    fn test_progressive_flag_writes_progressive_scans() {
        let flags = EncodeFlags {
            progressive: true,
            optimize: true,
            ..Default::default()
        };
        let config = EncodeConfig::new(MediaFormat::Jpeg, flags).with_quality(Some(80));
        let probe = ImageCodec.encode(&gradient(48, 32), &config).unwrap();

        // SOF2: progressive DCT
        assert!(has_marker(probe.bytes(), 0xC2));
        let decoded = image::load_from_memory(probe.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (48, 32));
    }

    #[test]
    fn test_optimized_huffman_tables_are_not_larger() {
        let img = gradient(64, 64);
        let plain = EncodeConfig::new(MediaFormat::Jpeg, EncodeFlags::default()).with_quality(Some(75));
        let optimized = EncodeConfig::new(
            MediaFormat::Jpeg,
            EncodeFlags {
                optimize: true,
                ..Default::default()
            },
        )
        .with_quality(Some(75));

        let plain_size = ImageCodec.encode(&img, &plain).unwrap().size();
        let optimized_size = ImageCodec.encode(&img, &optimized).unwrap().size();
        assert!(optimized_size <= plain_size);
    }

    #[test]
    fn test_png_probe_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 64])));
        let flags = EncodeFlags {
            lossless: true,
            effort: Some(2),
            ..Default::default()
        };
        let probe = ImageCodec.encode(&img, &EncodeConfig::new(MediaFormat::Png, flags)).unwrap();

        let decoded = image::load_from_memory(probe.bytes()).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(3, 3)[3], 64);
    }

    #[test]
    fn test_webp_probe_keeps_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(16, 16, |x, _| {
            Rgba([120, 40, 200, if x < 8 { 0 } else { 255 }])
        }));
        let flags = EncodeFlags {
            effort: Some(6),
            ..Default::default()
        };
        let config = EncodeConfig::new(MediaFormat::WebP, flags).with_quality(Some(75));
        let probe = ImageCodec.encode(&img, &config).unwrap();

        assert_eq!(image::guess_format(probe.bytes()).unwrap(), image::ImageFormat::WebP);
        let decoded = image::load_from_memory(probe.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert!(decoded.to_rgba8().get_pixel(1, 1)[3] < 128);
    }

    #[test]
    fn test_bmp_probe() {
        let probe = ImageCodec
            .encode(&gradient(5, 4), &EncodeConfig::new(MediaFormat::Bmp, EncodeFlags::default()))
            .unwrap();
        assert_eq!(image::guess_format(probe.bytes()).unwrap(), image::ImageFormat::Bmp);
    }

    #[test]
    fn test_video_format_is_rejected_for_stills() {
        let result = ImageCodec.encode(
            &gradient(2, 2),
            &EncodeConfig::new(MediaFormat::Mp4, EncodeFlags::default()),
        );
        assert!(matches!(result, Err(CompressError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_gif_frames_probe_keeps_frame_count() {
        let frames: Vec<Frame> = (0..3)
            .map(|i| {
                let buffer = RgbaImage::from_fn(12, 12, |x, y| Rgba([(x * 20) as u8, (y * 20) as u8, i * 80, 255]));
                Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
            })
            .collect();
        let config = EncodeConfig::new(MediaFormat::Gif, EncodeFlags::default()).with_quality(Some(40));
        let probe = ImageCodec.encode(frames.as_slice(), &config).unwrap();

        assert_eq!(image::guess_format(probe.bytes()).unwrap(), image::ImageFormat::Gif);
        let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(probe.bytes())).unwrap();
        use image::AnimationDecoder;
        assert_eq!(decoder.into_frames().collect_frames().unwrap().len(), 3);
    }

    #[test]
    fn test_quantize_channel_bounds() {
        assert_eq!(quantize_channel(0, 2), 0);
        assert_eq!(quantize_channel(255, 2), 255);
        assert_eq!(quantize_channel(200, 256), 200);
        assert_eq!(posterize_levels(100), 256);
        assert!(posterize_levels(10) < posterize_levels(80));
        assert_eq!(gif_speed(100), 1);
        assert!(gif_speed(10) <= 30);
    }

    #[test]
    fn test_lanczos_resampler_exact_dimensions() {
        let resized = LanczosResampler.resize(&gradient(100, 50), 90, 45);
        assert_eq!(resized.dimensions(), (90, 45));
    }
}
