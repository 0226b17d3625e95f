//! Image preprocessing
//!
//! Turns a decoded RGB scan into a fixed-size grayscale image:
//! grayscale -> Gaussian blur -> ROI crop -> aspect-preserving resize.
//! Every step returns a new image and leaves its input untouched.

pub mod filter;
pub mod geometry;

pub use self::filter::{convolve, gaussian_kernel};
pub use self::geometry::{crop_roi, resize_nearest, resize_with_padding};

use crate::core::{Matrix, PreprocessConfig, Result, ScanError};
use image::{GrayImage, Luma, RgbImage};
use log::debug;
use std::path::Path;

/// Luminosity grayscale: 0.299 R + 0.587 G + 0.114 B, truncated to u8
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Luma([(0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) as u8])
    })
}

/// Scale intensities into [0, 1]
pub fn normalize(image: &GrayImage) -> Matrix {
    let data = image.as_raw().iter().map(|&p| p as f64 / 255.0).collect();
    Matrix::from_vec(image.height() as usize, image.width() as usize, data)
}

/// Decode encoded image bytes (PNG, JPEG, ...) into RGB
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| ScanError::Decode(e.to_string()))
}

/// Read and decode an image file into RGB
pub fn open<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Configured preprocessing pipeline
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
    kernel: Matrix,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        let kernel = gaussian_kernel(config.kernel_size, config.sigma)?;
        Ok(Self { config, kernel })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Blur kernel built from the configuration
    pub fn kernel(&self) -> &Matrix {
        &self.kernel
    }

    /// Run the full chain on a decoded RGB image
    pub fn run(&self, image: &RgbImage) -> GrayImage {
        let gray = to_grayscale(image);
        let blurred = convolve(&gray, &self.kernel);
        let cropped = crop_roi(&blurred, self.config.roi_threshold);
        debug!(
            "Preprocess: {}x{} -> crop {}x{} -> {}x{}",
            gray.width(),
            gray.height(),
            cropped.width(),
            cropped.height(),
            self.config.target_size,
            self.config.target_size
        );
        resize_with_padding(&cropped, self.config.target_size)
    }

    /// Decode encoded bytes into RGB; see [`decode`]
    pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
        decode(bytes)
    }

    /// Decode bytes and run the chain
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<GrayImage> {
        let rgb = Self::decode(bytes)?;
        Ok(self.run(&rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_grayscale_weights() {
        let mut rgb = RgbImage::new(3, 1);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, Rgb([0, 255, 0]));
        rgb.put_pixel(2, 0, Rgb([0, 0, 255]));

        let gray = to_grayscale(&rgb);
        // 0.299 * 255 = 76.2, 0.587 * 255 = 149.7, 0.114 * 255 = 29.07
        assert_eq!(gray.as_raw().as_slice(), &[76, 149, 29]);
    }

    #[test]
    fn test_grayscale_white_stays_white() {
        let rgb = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let gray = to_grayscale(&rgb);
        // The weights sum to 1.0 only up to rounding, so 255 may land on 254.
        assert!(gray.as_raw().iter().all(|&p| p >= 254));
    }

    #[test]
    fn test_normalize_range() {
        let img = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let m = normalize(&img);
        assert_eq!(m.as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert_eq!(err.code(), "invalid_image");
    }

    #[test]
    fn test_run_produces_target_size() {
        let rgb = RgbImage::from_fn(90, 40, |x, y| {
            if (20..70).contains(&x) && (10..30).contains(&y) {
                Rgb([200, 200, 200])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let pre = Preprocessor::new(PreprocessConfig::default()).unwrap();
        let out = pre.run(&rgb);
        assert_eq!(out.dimensions(), (64, 64));
        assert!(out.as_raw().iter().any(|&p| p > 100));
    }

    #[test]
    fn test_run_bytes_matches_run() {
        let rgb = RgbImage::from_fn(50, 70, |x, y| {
            let v = if x > 10 && y > 15 { 180 } else { 0 };
            Rgb([v, v, v])
        });
        let mut png = std::io::Cursor::new(Vec::new());
        rgb.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let pre = Preprocessor::new(PreprocessConfig::default()).unwrap();
        let from_bytes = pre.run_bytes(png.get_ref()).unwrap();
        assert_eq!(from_bytes, pre.run(&rgb));
        assert!(pre.run_bytes(b"nope").is_err());
    }

    #[test]
    fn test_run_all_black() {
        let rgb = RgbImage::new(30, 30);
        let out = Preprocessor::new(PreprocessConfig::default()).unwrap().run(&rgb);
        assert_eq!(out.dimensions(), (64, 64));
        assert!(out.as_raw().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_preprocessor_rejects_bad_sigma() {
        let config = PreprocessConfig {
            sigma: 0.0,
            ..PreprocessConfig::default()
        };
        assert!(Preprocessor::new(config).is_err());
    }
}
