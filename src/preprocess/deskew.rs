//! Skew estimation and correction.

use std::panic::{catch_unwind, AssertUnwindSafe};

use image::{GrayImage, Luma};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use tracing::{debug, warn};

/// Rotations at or below this magnitude (degrees) are not applied.
pub const MIN_CORRECTION_DEGREES: f32 = 0.5;

/// Estimate the counter-clockwise rotation, in degrees, that levels the
/// foreground of `image`.
///
/// Foreground is every non-zero pixel. Returns `None` when there is no
/// foreground or the rectangle fit fails.
pub fn estimate_skew(image: &GrayImage) -> Option<f32> {
    let points = foreground_outline(image);
    if points.is_empty() {
        return None;
    }
    if points.len() < 3 {
        return Some(0.0);
    }

    let rect = match catch_unwind(AssertUnwindSafe(|| min_area_rect(&points))) {
        Ok(rect) => rect,
        Err(_) => {
            warn!("Minimum-area rectangle fit panicked, skipping deskew");
            return None;
        }
    };

    // Corners are integer, so the longer edge gives the steadier direction.
    let edge = |a: Point<i32>, b: Point<i32>| ((b.x - a.x) as f32, (b.y - a.y) as f32);
    let (ax, ay) = edge(rect[0], rect[1]);
    let (bx, by) = edge(rect[1], rect[2]);
    let (edge_x, edge_y) = if ax * ax + ay * ay >= bx * bx + by * by {
        (ax, ay)
    } else {
        (bx, by)
    };
    if edge_x == 0.0 && edge_y == 0.0 {
        return Some(0.0);
    }

    let angle = rect_angle(edge_y.atan2(edge_x).to_degrees());
    let corrected = if angle < -45.0 { -(90.0 + angle) } else { -angle };
    debug!("Skew estimate: rect angle {:.2}, correction {:.2}", angle, corrected);
    Some(corrected)
}

/// Fold an edge direction into the rectangle angle range `[-90, 0)`.
///
/// Both edge directions of a rectangle fold to the same value; an
/// axis-aligned rectangle reports -90.
fn rect_angle(edge_degrees: f32) -> f32 {
    let folded = edge_degrees % 90.0;
    if folded >= 0.0 {
        folded - 90.0
    } else {
        folded
    }
}

/// Leftmost and rightmost foreground pixel of every row.
///
/// These carry the same convex hull as the full foreground set. Points are
/// `(row, column)`, which is the orientation [`estimate_skew`]'s sign
/// convention is defined in.
fn foreground_outline(image: &GrayImage) -> Vec<Point<i32>> {
    let (width, height) = image.dimensions();
    let mut points = Vec::new();
    for y in 0..height {
        let first = (0..width).find(|&x| image.get_pixel(x, y).0[0] != 0);
        let Some(first) = first else { continue };
        let last = (first..width)
            .rev()
            .find(|&x| image.get_pixel(x, y).0[0] != 0)
            .unwrap_or(first);

        points.push(Point::new(y as i32, first as i32));
        if last != first {
            points.push(Point::new(y as i32, last as i32));
        }
    }
    points
}

/// Rotate `image` counter-clockwise by `degrees` around its integer center.
///
/// Bicubic interpolation; samples that fall outside the image replicate the
/// nearest edge pixel. Output has the same dimensions as the input.
pub fn rotate(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;
    let (sin, cos) = degrees.to_radians().sin_cos();

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;
        Luma([sample_bicubic(image, sx, sy)])
    })
}

fn sample_bicubic(image: &GrayImage, x: f32, y: f32) -> u8 {
    let (width, height) = image.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let wx = cubic_weights(x - x0);
    let wy = cubic_weights(y - y0);

    let mut acc = 0.0f32;
    for (j, wy) in wy.iter().enumerate() {
        let py = (y0 as i64 + j as i64 - 1).clamp(0, height as i64 - 1) as u32;
        for (i, wx) in wx.iter().enumerate() {
            let px = (x0 as i64 + i as i64 - 1).clamp(0, width as i64 - 1) as u32;
            acc += wx * wy * image.get_pixel(px, py).0[0] as f32;
        }
    }
    acc.round().clamp(0.0, 255.0) as u8
}

/// Catmull-Rom style weights with `a = -0.75` for offsets -1, 0, 1, 2.
fn cubic_weights(t: f32) -> [f32; 4] {
    const A: f32 = -0.75;
    let w0 = ((A * (t + 1.0) - 5.0 * A) * (t + 1.0) + 8.0 * A) * (t + 1.0) - 4.0 * A;
    let w1 = ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0;
    let w2 = ((A + 2.0) * (1.0 - t) - (A + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}
