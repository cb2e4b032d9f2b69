//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Dimensions | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG) | `image::ImageReader` with format guessed from content |
//! | Border detection | [`content_bounds`](super::calculations::content_bounds) over RGBA8 pixels |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Encode → PNG | `image::DynamicImage::save_with_format` (lossless), to a temp sibling renamed over the output |

use super::backend::{BackendError, CropOutcome, Dimensions, ImageBackend};
use super::calculations::content_bounds;
use super::params::CropParams;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs;
use std::path::{Path, PathBuf};

/// Pure Rust backend using the `image` crate.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// `<output>.tmp`, next to the output so the final rename stays on one filesystem.
fn temp_sibling(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Load and decode an image from disk, sniffing the format from its bytes.
///
/// Downloads are stored before their container is known, so the extension
/// cannot be trusted.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn crop(&self, params: &CropParams) -> Result<CropOutcome, BackendError> {
        let img = load_image(&params.source)?;
        let rgba = img.to_rgba8();

        let Some(rect) = content_bounds(rgba.width(), rgba.height(), params.detection, |x, y| {
            rgba.get_pixel(x, y).0
        }) else {
            return Ok(CropOutcome::Unchanged);
        };

        // The output may be the source itself; it is only replaced once the
        // new PNG is fully written.
        let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let tmp = temp_sibling(&params.output);
        if let Err(e) = cropped.save_with_format(&tmp, ImageFormat::Png) {
            fs::remove_file(&tmp).ok();
            return Err(BackendError::ProcessingFailed(format!(
                "PNG encode failed: {}",
                e
            )));
        }
        if let Err(e) = fs::rename(&tmp, &params.output) {
            fs::remove_file(&tmp).ok();
            return Err(BackendError::Io(e));
        }

        Ok(CropOutcome::Cropped {
            rect,
            output: params.output.clone(),
        })
    }
}
