//! Central-difference gradients and Histogram of Oriented Gradients

use crate::core::Matrix;
use image::GrayImage;

/// Per-pixel gradient magnitude and unsigned orientation in degrees
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    /// sqrt(gx^2 + gy^2)
    pub magnitude: Matrix,
    /// atan2(gy, gx) folded into [0, 180]
    pub angle: Matrix,
}

/// Central-difference gradients
///
/// `gx(x, y) = I(x+1, y) - I(x-1, y)` on interior columns and
/// `gy(x, y) = I(x, y+1) - I(x, y-1)` on interior rows. Border columns of
/// `gx` and border rows of `gy` stay zero.
pub fn compute_gradients(image: &GrayImage) -> GradientField {
    let (width, height) = image.dimensions();
    let mut magnitude = Matrix::zeros(height as usize, width as usize);
    let mut angle = Matrix::zeros(height as usize, width as usize);
    let at = |x: u32, y: u32| image.get_pixel(x, y)[0] as f64;

    for y in 0..height {
        for x in 0..width {
            let gx = if x > 0 && x + 1 < width {
                at(x + 1, y) - at(x - 1, y)
            } else {
                0.0
            };
            let gy = if y > 0 && y + 1 < height {
                at(x, y + 1) - at(x, y - 1)
            } else {
                0.0
            };

            let mut deg = gy.atan2(gx).to_degrees();
            if deg < 0.0 {
                deg += 180.0;
            }
            let (r, c) = (y as usize, x as usize);
            magnitude.set(r, c, (gx * gx + gy * gy).sqrt());
            angle.set(r, c, deg);
        }
    }

    GradientField { magnitude, angle }
}

/// Magnitude-weighted orientation histogram for one cell, L2-normalized
fn cell_histogram(
    field: &GradientField,
    top: usize,
    left: usize,
    cell_size: usize,
    bins: usize,
) -> Vec<f64> {
    let bin_width = 180.0 / bins as f64;
    let mut hist = vec![0.0; bins];

    for y in top..top + cell_size {
        for x in left..left + cell_size {
            let bin = ((field.angle.get(y, x) / bin_width) as usize).min(bins - 1);
            hist[bin] += field.magnitude.get(y, x);
        }
    }

    let norm = hist.iter().map(|v| v * v).sum::<f64>().sqrt() + 1e-5;
    hist.iter().map(|v| v / norm).collect()
}

/// HOG over precomputed gradients
///
/// Splits the field into non-overlapping `cell_size` squares (partial cells
/// at the right and bottom edges are dropped) and concatenates their
/// histograms in row-major cell order.
pub fn hog_from_gradients(field: &GradientField, cell_size: usize, bins: usize) -> Vec<f64> {
    let (height, width) = field.magnitude.shape();
    let n_cells_y = height / cell_size;
    let n_cells_x = width / cell_size;

    let mut features = Vec::with_capacity(n_cells_y * n_cells_x * bins);
    for cy in 0..n_cells_y {
        for cx in 0..n_cells_x {
            features.extend(cell_histogram(
                field,
                cy * cell_size,
                cx * cell_size,
                cell_size,
                bins,
            ));
        }
    }
    features
}

/// HOG descriptor of an image
pub fn hog_descriptor(image: &GrayImage, cell_size: usize, bins: usize) -> Vec<f64> {
    hog_from_gradients(&compute_gradients(image), cell_size, bins)
}

/// Descriptor length for an image of the given size
pub fn hog_len(width: u32, height: u32, cell_size: usize, bins: usize) -> usize {
    (width as usize / cell_size) * (height as usize / cell_size) * bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    fn image_from(width: u32, height: u32, f: impl Fn(u32, u32) -> u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([f(x, y) as u8]))
    }

    #[test]
    fn test_gradient_borders_are_zero() {
        let img = image_from(5, 5, |x, y| x * 20 + y * 7);
        let field = compute_gradients(&img);
        // Corners have neither gx nor gy
        assert_eq!(field.magnitude.get(0, 0), 0.0);
        assert_eq!(field.magnitude.get(4, 4), 0.0);
        // Top row interior column: gx only
        assert_relative_eq!(field.magnitude.get(0, 2), 40.0);
        assert_relative_eq!(field.angle.get(0, 2), 0.0);
        // Left column interior row: gy only
        assert_relative_eq!(field.magnitude.get(2, 0), 14.0);
        assert_relative_eq!(field.angle.get(2, 0), 90.0);
    }

    #[test]
    fn test_gradient_angle_folding() {
        // Intensity decreases to the right: gx < 0, gy = 0 -> atan2 = 180
        let img = image_from(3, 3, |x, _| 200 - x * 50);
        let field = compute_gradients(&img);
        assert_relative_eq!(field.angle.get(1, 1), 180.0);

        // Diagonal decrease: gx < 0, gy < 0 -> -135 + 180 = 45
        let img = image_from(3, 3, |x, y| 200 - x * 30 - y * 30);
        let field = compute_gradients(&img);
        assert_relative_eq!(field.angle.get(1, 1), 45.0, epsilon = 1e-9);
        assert!(field
            .angle
            .as_slice()
            .iter()
            .all(|&a| (0.0..=180.0).contains(&a)));
    }

    #[test]
    fn test_hog_length_drops_partial_cells() {
        let img = image_from(70, 40, |x, y| (x * y) % 256);
        let hog = hog_descriptor(&img, 16, 9);
        assert_eq!(hog.len(), 4 * 2 * 9);
        assert_eq!(hog.len(), hog_len(70, 40, 16, 9));
    }

    #[test]
    fn test_hog_cells_unit_norm() {
        let img = image_from(64, 64, |x, y| (x * 7 + y * 3 + (x * y) % 11) % 256);
        let hog = hog_descriptor(&img, 16, 9);
        for cell in hog.chunks(9) {
            let norm = cell.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_hog_flat_cell_is_zero() {
        let img = image_from(32, 32, |_, _| 128);
        let hog = hog_descriptor(&img, 16, 9);
        assert!(hog.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_hog_180_degrees_lands_in_last_bin() {
        let img = image_from(4, 4, |x, _| 200 - x * 50);
        let hog = hog_descriptor(&img, 4, 9);
        let last = hog[8];
        assert!(last > 0.9);
        assert!(hog[..8].iter().all(|&v| v == 0.0));
    }
}
