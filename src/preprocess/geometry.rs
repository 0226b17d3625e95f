//! Region-of-interest cropping and nearest-neighbor resizing

use image::imageops;
use image::GrayImage;

/// Crop to the bounding box of pixels brighter than `threshold`
///
/// Uses row and column projections of the binarized image. An image with
/// no pixel above the threshold is returned unchanged.
pub fn crop_roi(image: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut row_sum = vec![0usize; height as usize];
    let mut col_sum = vec![0usize; width as usize];

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[0] > threshold {
            row_sum[y as usize] += 1;
            col_sum[x as usize] += 1;
        }
    }

    let first_last = |proj: &[usize]| -> Option<(u32, u32)> {
        let first = proj.iter().position(|&s| s > 0)?;
        let last = proj.iter().rposition(|&s| s > 0)?;
        Some((first as u32, last as u32))
    };

    match (first_last(&row_sum), first_last(&col_sum)) {
        (Some((y_min, y_max)), Some((x_min, x_max))) => {
            imageops::crop_imm(image, x_min, y_min, x_max - x_min + 1, y_max - y_min + 1)
                .to_image()
        }
        _ => image.clone(),
    }
}

/// Nearest-neighbor stretch to exactly `new_width x new_height`
///
/// Source index is `floor(dest * src_dim / dest_dim)`, clamped to the last
/// valid index.
pub fn resize_nearest(image: &GrayImage, new_width: u32, new_height: u32) -> GrayImage {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return GrayImage::new(new_width, new_height);
    }

    let x_ratio = src_w as f64 / new_width as f64;
    let y_ratio = src_h as f64 / new_height as f64;

    GrayImage::from_fn(new_width, new_height, |x, y| {
        let src_x = ((x as f64 * x_ratio) as u32).min(src_w - 1);
        let src_y = ((y as f64 * y_ratio) as u32).min(src_h - 1);
        *image.get_pixel(src_x, src_y)
    })
}

/// Fit the image into a `target_size` square without distortion
///
/// The image is scaled uniformly by `min(target / w, target / h)`, resized
/// with nearest-neighbor sampling and centered on a black canvas.
pub fn resize_with_padding(image: &GrayImage, target_size: u32) -> GrayImage {
    let (src_w, src_h) = image.dimensions();
    let mut canvas = GrayImage::new(target_size, target_size);
    if src_w == 0 || src_h == 0 || target_size == 0 {
        return canvas;
    }

    let scale = (target_size as f64 / src_w as f64).min(target_size as f64 / src_h as f64);
    let new_w = ((src_w as f64 * scale) as u32).clamp(1, target_size);
    let new_h = ((src_h as f64 * scale) as u32).clamp(1, target_size);

    let resized = resize_nearest(image, new_w, new_h);

    let x_offset = (target_size - new_w) / 2;
    let y_offset = (target_size - new_h) / 2;
    imageops::replace(&mut canvas, &resized, x_offset as i64, y_offset as i64);
    canvas
}
