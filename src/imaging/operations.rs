//! High-level image operations.
//!
//! These functions decide where a crop lands and tidy up after it; the
//! backend only does the pixel work.

use super::backend::{BackendError, CropOutcome, ImageBackend};
use super::params::{BorderDetection, CropParams};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// Plan a border crop without executing it.
///
/// The output is always a `.png` next to the source so the re-encode is
/// lossless, whatever container the download arrived in.
pub fn plan_crop(source: &Path, detection: BorderDetection) -> CropParams {
    CropParams {
        source: source.to_path_buf(),
        output: source.with_extension("png"),
        detection,
    }
}

/// Remove a uniform border from the image at `path`, in place.
///
/// Returns the path of the cropped image, or `None` when there was no
/// border to remove. When the source was not a PNG the cropped copy gets a
/// `.png` name and the original is deleted.
pub fn auto_crop(
    backend: &impl ImageBackend,
    path: &Path,
    detection: BorderDetection,
) -> Result<Option<PathBuf>> {
    let params = plan_crop(path, detection);
    match backend.crop(&params)? {
        CropOutcome::Unchanged => Ok(None),
        CropOutcome::Cropped { rect, output } => {
            log::debug!(
                "Cropped {} to {}x{} at ({}, {})",
                path.display(),
                rect.width,
                rect.height,
                rect.x,
                rect.y
            );
            if output != path {
                std::fs::remove_file(path)?;
            }
            Ok(Some(output))
        }
    }
}
