//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two pixel operations the pipeline
//! needs: identify (dimensions) and crop (border removal).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::{CropParams, Rect};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// What a crop request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CropOutcome {
    /// No border worth removing; the source file is untouched.
    Unchanged,
    /// The image was cropped to `rect` and written to `output`.
    Cropped { rect: Rect, output: PathBuf },
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Detect a uniform border and crop it away.
    fn crop(&self, params: &CropParams) -> Result<CropOutcome, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        /// Rectangle reported for every crop; `None` reports `Unchanged`.
        pub crop_rect: Option<Rect>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Crop { source: String, output: String },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cropping_to(rect: Rect) -> Self {
            Self {
                crop_rect: Some(rect),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn crop(&self, params: &CropParams) -> Result<CropOutcome, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Crop {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
            });
            Ok(match self.crop_rect {
                Some(rect) => CropOutcome::Cropped {
                    rect,
                    output: params.output.clone(),
                },
                None => CropOutcome::Unchanged,
            })
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend {
            identify_results: Mutex::new(vec![Dimensions {
                width: 800,
                height: 600,
            }]),
            ..MockBackend::default()
        };

        let result = backend.identify(Path::new("/test/image.png")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.png"));
    }

    #[test]
    fn mock_crop_reports_unchanged_by_default() {
        let backend = MockBackend::new();
        let outcome = backend
            .crop(&CropParams {
                source: "/a.jpg".into(),
                output: "/a.png".into(),
                detection: Default::default(),
            })
            .unwrap();
        assert_eq!(outcome, CropOutcome::Unchanged);
        assert_eq!(backend.get_operations().len(), 1);
    }
}
