//! Adaptive Gaussian thresholding.
//!
//! `imageproc::contrast::adaptive_threshold` uses a box mean and has no
//! offset constant, so the Gaussian variant is done here: a pixel becomes
//! white when it is brighter than its Gaussian-weighted neighborhood minus
//! `constant`.

use image::{GrayImage, Luma};
use imageproc::filter::separable_filter_equal;

/// Binarize `image` with a Gaussian local mean over `block_size` pixels.
///
/// `block_size` must be odd; even sizes are bumped to the next odd value.
pub fn adaptive_gaussian_threshold(image: &GrayImage, block_size: u32, constant: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let block_size = if block_size % 2 == 0 { block_size + 1 } else { block_size };
    let kernel = gaussian_kernel(block_size);
    // Borders are replicated by the filter.
    let mean: GrayImage = separable_filter_equal(image, &kernel);

    GrayImage::from_fn(width, height, |x, y| {
        let src = image.get_pixel(x, y).0[0] as i32;
        let local = mean.get_pixel(x, y).0[0] as i32;
        if src - local > -constant {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Normalized 1-D Gaussian kernel of odd length `size`.
///
/// Sigma follows the common size-derived rule
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`, which is 2.0 for a size of 11.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (size / 2) as i32;
    let denom = 2.0 * sigma * sigma;
    let raw: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|v| v / sum).collect()
}
