//! Receipt photo normalization ahead of OCR.
//!
//! Steps, in order: auto-orient from EXIF, cap the longer edge, grayscale,
//! contrast stretch, unsharp mask, fixed-threshold binarization. The result
//! is written next to the source as `<file name>.ocr.png`; the source itself
//! is never touched. The derived file is staged under a temporary name and
//! renamed into place, so readers only ever see a complete image.
//!
//! Preprocessing only improves recognition odds. [`ImagePreprocessor::preprocess`]
//! never fails: on any error it hands back the original path.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageDecoder, ImageFormat, ImageReader};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while preprocessing. Only visible through `try_preprocess`.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Source path has no file name: {0}")]
    InvalidPath(PathBuf),
}

/// Tunables for the normalization chain.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Longer edge cap in pixels. Smaller images are never upscaled.
    pub max_edge: u32,
    /// Luma level above which a pixel becomes white.
    pub threshold: u8,
    /// Gaussian sigma for the unsharp mask.
    pub sharpen_sigma: f32,
    /// Minimum difference before the unsharp mask applies.
    pub sharpen_threshold: i32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            max_edge: 2000,
            threshold: 150,
            sharpen_sigma: 1.0,
            sharpen_threshold: 4,
        }
    }
}

/// Turns receipt photos into high-contrast black and white images.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    options: PreprocessOptions,
}

impl ImagePreprocessor {
    pub fn new(options: PreprocessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    /// Best-effort preprocessing: the processed path, or `source` on failure.
    pub fn preprocess(&self, source: &Path) -> PathBuf {
        match self.try_preprocess(source) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    "Preprocessing failed for {}, using original: {}",
                    source.display(),
                    e
                );
                source.to_path_buf()
            }
        }
    }

    /// Run the normalization chain and write the derived image.
    pub fn try_preprocess(&self, source: &Path) -> Result<PathBuf, PreprocessError> {
        let output = Self::output_path(source)?;
        let img = load_oriented(source)?;
        let processed = self.normalize(img);
        write_atomically(&processed, &output)?;
        tracing::debug!(
            "Preprocessed {} -> {} ({}x{})",
            source.display(),
            output.display(),
            processed.width(),
            processed.height()
        );
        Ok(output)
    }

    /// Where the derived image for `source` is written. The full file name
    /// is kept so `a.jpg` and `a.png` never share a derived image.
    pub fn output_path(source: &Path) -> Result<PathBuf, PreprocessError> {
        let name = source
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| PreprocessError::InvalidPath(source.to_path_buf()))?;
        Ok(source.with_file_name(format!("{}.ocr.png", name)))
    }

    /// Apply every normalization step to an already oriented image.
    pub fn normalize(&self, img: DynamicImage) -> GrayImage {
        let img = downscale(img, self.options.max_edge);
        let mut gray = img.to_luma8();
        stretch_contrast(&mut gray);
        let mut gray = imageops::unsharpen(
            &gray,
            self.options.sharpen_sigma,
            self.options.sharpen_threshold,
        );
        binarize(&mut gray, self.options.threshold);
        gray
    }
}

/// Decode an image and rotate/flip it according to its EXIF orientation.
fn load_oriented(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Encode `img` as PNG into a temporary file beside `output`, then rename it
/// over `output`.
fn write_atomically(img: &GrayImage, output: &Path) -> Result<(), PreprocessError> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        img.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;
    }
    staged.persist(output).map_err(|e| e.error)?;
    Ok(())
}

fn downscale(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        return img;
    }
    // `resize` keeps the aspect ratio within the bounding box.
    img.resize(max_edge, max_edge, FilterType::Triangle)
}

/// Linear stretch between the 1st and 99th luma percentiles.
fn stretch_contrast(img: &mut GrayImage) {
    let total = (img.width() as u64) * (img.height() as u64);
    if total == 0 {
        return;
    }

    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let clip = total / 100;
    let percentile = |iter: &mut dyn Iterator<Item = usize>| {
        let mut seen = 0u64;
        for level in iter {
            seen += histogram[level];
            if seen > clip {
                return level as u8;
            }
        }
        0
    };
    let low = percentile(&mut (0..256));
    let high = percentile(&mut (0..256).rev());
    if high <= low {
        return;
    }

    let range = (high - low) as f32;
    for pixel in img.pixels_mut() {
        let v = pixel.0[0].clamp(low, high);
        pixel.0[0] = (((v - low) as f32 / range) * 255.0).round() as u8;
    }
}

fn binarize(img: &mut GrayImage, threshold: u8) {
    for pixel in img.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_output_path_is_adjacent() {
        let out = ImagePreprocessor::output_path(Path::new("/uploads/17-receipt.jpg")).unwrap();
        assert_eq!(out, PathBuf::from("/uploads/17-receipt.jpg.ocr.png"));
    }

    #[test]
    fn test_output_path_keeps_sources_with_same_stem_apart() {
        let jpg = ImagePreprocessor::output_path(Path::new("/uploads/a.jpg")).unwrap();
        let png = ImagePreprocessor::output_path(Path::new("/uploads/a.png")).unwrap();
        assert_ne!(jpg, png);
    }

    #[test]
    fn test_downscale_caps_longer_edge_only() {
        let tall = DynamicImage::ImageLuma8(GrayImage::new(1000, 4000));
        let scaled = downscale(tall, 2000);
        assert_eq!(scaled.height(), 2000);
        assert_eq!(scaled.width(), 500);

        let small = DynamicImage::ImageLuma8(GrayImage::new(300, 200));
        let kept = downscale(small, 2000);
        assert_eq!((kept.width(), kept.height()), (300, 200));
    }

    #[test]
    fn test_normalize_produces_pure_black_and_white() {
        let img = RgbImage::from_fn(64, 32, |x, _| {
            if x < 32 {
                Rgb([90, 90, 90])
            } else {
                Rgb([170, 170, 170])
            }
        });
        let out = ImagePreprocessor::default().normalize(DynamicImage::ImageRgb8(img));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(out.get_pixel(2, 16), &Luma([0]));
        assert_eq!(out.get_pixel(60, 16), &Luma([255]));
    }

    #[test]
    fn test_stretch_contrast_spans_full_range() {
        let mut img = GrayImage::from_fn(100, 1, |x, _| Luma([100 + (x as u8 % 50)]));
        stretch_contrast(&mut img);
        let min = img.pixels().map(|p| p.0[0]).min().unwrap();
        let max = img.pixels().map(|p| p.0[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_preprocess_writes_derived_file_and_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("receipt.png");
        GrayImage::from_pixel(40, 20, Luma([200])).save(&source).unwrap();
        let before = std::fs::read(&source).unwrap();

        let out = ImagePreprocessor::default().preprocess(&source);

        assert_eq!(out, dir.path().join("receipt.png.ocr.png"));
        assert!(out.exists());
        assert_eq!(std::fs::read(&source).unwrap(), before);

        // Only the source and the derived image remain; no staging files.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_concurrent_runs_never_expose_partial_images() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("receipt.png");
        GrayImage::from_fn(600, 800, |x, y| Luma([((x ^ y) % 256) as u8]))
            .save(&source)
            .unwrap();
        let output = ImagePreprocessor::output_path(&source).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..3 {
                        let out = ImagePreprocessor::default().preprocess(&source);
                        assert_eq!(out, output);
                        let decoded = image::open(&out).unwrap();
                        assert_eq!((decoded.width(), decoded.height()), (600, 800));
                    }
                });
            }
        });

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_preprocess_falls_back_to_original_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("receipt.jpg");
        std::fs::write(&source, b"definitely not an image").unwrap();

        let out = ImagePreprocessor::default().preprocess(&source);
        assert_eq!(out, source);
    }

    #[test]
    fn test_preprocess_falls_back_when_missing() {
        let source = PathBuf::from("/nonexistent/receipt.jpg");
        assert_eq!(ImagePreprocessor::default().preprocess(&source), source);
    }
}
