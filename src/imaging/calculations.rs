//! Pure functions for border detection.
//!
//! Nothing here touches the filesystem or decodes images: pixels are read
//! through a closure so the bounding-box logic can be tested on tiny
//! synthetic grids.

use super::params::{BorderDetection, Rect};

/// Largest possible Euclidean distance between two ARGB colours, rounded to
/// the conventional 510 (`sqrt(4 * 255^2)`).
const MAX_COLOR_DISTANCE: f64 = 510.0;

/// Euclidean distance between two 4-channel colours, normalized to 0.0–1.0.
///
/// Channel order does not matter as long as both sides use the same one.
pub fn color_distance(a: [u8; 4], b: [u8; 4]) -> f64 {
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    sum.sqrt() / MAX_COLOR_DISTANCE
}

/// Find the rectangle worth keeping, or `None` when cropping would be wasted work.
///
/// Every `stride`-th pixel is compared against the top-left pixel; samples
/// further than `tolerance` away count as content. `None` is returned when no
/// sample is content (a uniform image is never cropped to nothing) or when
/// the content box already spans the image to within one sample step.
pub fn content_bounds(
    width: u32,
    height: u32,
    detection: BorderDetection,
    pixel: impl Fn(u32, u32) -> [u8; 4],
) -> Option<Rect> {
    if width == 0 || height == 0 {
        return None;
    }
    let stride = detection.stride.max(1) as usize;
    let base = pixel(0, 0);

    let mut top_x = u32::MAX;
    let mut top_y = u32::MAX;
    let mut bottom_x = 0u32;
    let mut bottom_y = 0u32;
    let mut found = false;

    for y in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            if color_distance(base, pixel(x, y)) > detection.tolerance {
                found = true;
                top_x = top_x.min(x);
                top_y = top_y.min(y);
                bottom_x = bottom_x.max(x);
                bottom_y = bottom_y.max(y);
            }
        }
    }

    if !found {
        return None;
    }

    let step = stride as u32;
    let spans_width = top_x == 0 && bottom_x + step >= width;
    let spans_height = top_y == 0 && bottom_y + step >= height;
    if spans_width && spans_height {
        return None;
    }

    Some(Rect {
        x: top_x,
        y: top_y,
        width: bottom_x - top_x + 1,
        height: bottom_y - top_y + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];

    #[test]
    fn identical_colors_have_zero_distance() {
        assert_eq!(color_distance(RED, RED), 0.0);
    }

    #[test]
    fn full_range_distance_is_one() {
        assert!((color_distance([0, 0, 0, 0], [255, 255, 255, 255]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn near_colors_fall_within_tolerance() {
        // sqrt(3 * 20^2) / 510 ≈ 0.068
        let d = color_distance(WHITE, [235, 235, 235, 255]);
        assert!(d < 0.10, "distance {d}");
    }

    #[test]
    fn uniform_image_is_left_alone() {
        let bounds = content_bounds(30, 20, BorderDetection::default(), |_, _| WHITE);
        assert_eq!(bounds, None);
    }

    #[test]
    fn tight_image_is_left_alone() {
        // Only the corner matches itself; every other sample is content,
        // including samples on all four borders.
        let bounds = content_bounds(9, 9, BorderDetection::default(), |x, y| {
            if x == 0 && y == 0 { RED } else { BLACK }
        });
        assert_eq!(bounds, None);
    }

    #[test]
    fn content_reaching_last_sample_counts_as_full() {
        // 10 wide: last sample column is 9, so 9 + 3 >= 10 spans the width.
        let bounds = content_bounds(10, 10, BorderDetection::default(), |x, y| {
            if x == 0 && y == 0 { WHITE } else { BLACK }
        });
        assert_eq!(bounds, None);
    }

    #[test]
    fn white_margin_is_cropped() {
        // 30x30 white canvas with a black block covering 9..=20 on both axes.
        let bounds = content_bounds(30, 30, BorderDetection::default(), |x, y| {
            if (9..=20).contains(&x) && (9..=20).contains(&y) {
                BLACK
            } else {
                WHITE
            }
        })
        .unwrap();
        assert_eq!(
            bounds,
            Rect {
                x: 9,
                y: 9,
                width: 10,
                height: 10
            }
        );
    }

    #[test]
    fn margin_on_one_side_only() {
        // White band across the top half, content below it.
        let bounds = content_bounds(12, 30, BorderDetection::default(), |_, y| {
            if y < 15 { WHITE } else { BLACK }
        })
        .unwrap();
        assert_eq!(bounds.x, 0);
        assert_eq!(bounds.y, 15);
        assert_eq!(bounds.width, 10);
        assert_eq!(bounds.height, 13);
    }

    #[test]
    fn empty_image_has_no_bounds() {
        assert_eq!(
            content_bounds(0, 10, BorderDetection::default(), |_, _| WHITE),
            None
        );
    }
}
