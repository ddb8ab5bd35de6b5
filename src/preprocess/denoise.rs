//! Non-local-means denoising for grayscale scans.
//!
//! Each output pixel is a weighted average over a square search window. The
//! weight of a candidate compares the template patch around it with the patch
//! around the target: `exp(-d / h²)`, where `d` is the mean squared difference
//! between the two patches. Patch sums are taken from one integral image per
//! search offset, so the cost is independent of the template size.

use image::{GrayImage, Luma};

/// Filter parameters, same meaning as the usual `h`, template and search
/// window sizes.
#[derive(Debug, Clone, Copy)]
pub struct NlMeansParams {
    pub h: f32,
    pub template_window: u32,
    pub search_window: u32,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            h: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

/// Denoise `image`. Borders are handled by edge replication.
pub fn non_local_means(image: &GrayImage, params: NlMeansParams) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let t = (params.template_window / 2) as i64;
    let s = (params.search_window / 2) as i64;
    let pad = t + s;
    let padded = Padded::new(image, pad);

    let w = width as i64;
    let h = height as i64;
    let area = ((2 * t + 1) * (2 * t + 1)) as u64;
    let weights = weight_table(params.h);

    // Region covered by every template patch of every output pixel, in
    // padded coordinates it starts at (s, s).
    let rw = (w + 2 * t) as usize;
    let rh = (h + 2 * t) as usize;
    let mut integral = vec![0u64; (rw + 1) * (rh + 1)];

    let pixels = (width as usize) * (height as usize);
    let mut weight_sum = vec![0f32; pixels];
    let mut value_sum = vec![0f32; pixels];

    for dy in -s..=s {
        for dx in -s..=s {
            // Integral image of squared differences for this offset.
            for ry in 0..rh {
                let mut row_acc = 0u64;
                let py = s + ry as i64;
                for rx in 0..rw {
                    let px = s + rx as i64;
                    let a = padded.get(px, py) as i64;
                    let b = padded.get(px + dx, py + dy) as i64;
                    row_acc += ((a - b) * (a - b)) as u64;
                    integral[(ry + 1) * (rw + 1) + rx + 1] =
                        integral[ry * (rw + 1) + rx + 1] + row_acc;
                }
            }

            let side = (2 * t + 1) as usize;
            for y in 0..height as usize {
                for x in 0..width as usize {
                    let (x0, y0) = (x, y);
                    let (x1, y1) = (x + side, y + side);
                    let ssd = integral[y1 * (rw + 1) + x1] + integral[y0 * (rw + 1) + x0]
                        - integral[y0 * (rw + 1) + x1]
                        - integral[y1 * (rw + 1) + x0];
                    let dist = (ssd / area) as usize;
                    let weight = weights[dist.min(weights.len() - 1)];
                    if weight == 0.0 {
                        continue;
                    }
                    let candidate = padded.get(x as i64 + pad + dx, y as i64 + pad + dy);
                    let idx = y * width as usize + x;
                    weight_sum[idx] += weight;
                    value_sum[idx] += weight * candidate as f32;
                }
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let idx = y as usize * width as usize + x as usize;
        let value = if weight_sum[idx] > 0.0 {
            value_sum[idx] / weight_sum[idx]
        } else {
            image.get_pixel(x, y).0[0] as f32
        };
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// `exp(-d / h²)` for every possible mean squared patch distance.
fn weight_table(h: f32) -> Vec<f32> {
    let h2 = (h * h).max(f32::EPSILON);
    (0..=255usize * 255)
        .map(|d| {
            let w = (-(d as f32) / h2).exp();
            // Negligible contributions are dropped.
            if w < 1e-3 {
                0.0
            } else {
                w
            }
        })
        .collect()
}

/// Copy of the image with `pad` replicated pixels on every side.
struct Padded {
    data: Vec<u8>,
    stride: usize,
}

impl Padded {
    fn new(image: &GrayImage, pad: i64) -> Self {
        let (w, h) = image.dimensions();
        let stride = w as usize + 2 * pad as usize;
        let rows = h as usize + 2 * pad as usize;
        let mut data = Vec::with_capacity(stride * rows);
        for py in 0..rows as i64 {
            let iy = (py - pad).clamp(0, h as i64 - 1) as u32;
            for px in 0..stride as i64 {
                let ix = (px - pad).clamp(0, w as i64 - 1) as u32;
                data.push(image.get_pixel(ix, iy).0[0]);
            }
        }
        Self { data, stride }
    }

    /// Pixel at padded coordinates `(x, y)`.
    #[inline]
    fn get(&self, x: i64, y: i64) -> u8 {
        self.data[y as usize * self.stride + x as usize]
    }
}
