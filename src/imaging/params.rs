//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They sit between
//! [`operations`](super::operations), which decides whether and where to
//! crop, and the [`backend`](super::backend), which does the pixel work. The
//! split lets tests swap in a mock backend without touching the crop policy.

use std::path::PathBuf;

/// Sampling stride and colour tolerance for border detection.
///
/// Sampling every 3rd row and column trades a little accuracy for a ninth of
/// the pixel reads on multi-megapixel images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderDetection {
    pub stride: u32,
    /// Normalized distance (0.0–1.0) a pixel must exceed to count as content.
    pub tolerance: f64,
}

impl Default for BorderDetection {
    fn default() -> Self {
        Self {
            stride: 3,
            tolerance: 0.10,
        }
    }
}

/// Pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Full specification for a border crop.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: PathBuf,
    /// Always written as PNG so the re-encode is lossless.
    pub output: PathBuf,
    pub detection: BorderDetection,
}
