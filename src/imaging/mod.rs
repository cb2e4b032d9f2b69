//! Image handling for downloaded artworks.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify container** | header magic ([`format::identify`]) |
//! | **Integrity check** | trailer bytes ([`format::verify_trailer`], [`format::inspect_file`]) |
//! | **Dimensions** | `image::image_dimensions` |
//! | **Border crop → PNG** | sampled colour distance + `crop_imm` |
//!
//! The module is split into:
//! - **Format**: byte-level container checks, no decoding
//! - **Calculations**: Pure functions for border detection (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, CropOutcome, Dimensions, ImageBackend};
pub use format::{ContainerType, CorruptFile, Identified, InspectError, VerifiedImage};
pub use operations::{auto_crop, get_dimensions};
pub use params::{BorderDetection, CropParams, Rect};
pub use rust_backend::RustBackend;
