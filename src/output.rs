//! CLI output formatting.
//!
//! Output leads with what was collected (index, title, artist) and keeps
//! file paths and URLs on indented context lines below.
//!
//! # Output Format
//!
//! ## Fetch
//!
//! ```text
//! 001/002 Sunset over the bay (#81234567)
//!     Skipped: no full-resolution image
//! 001/002 Harbor at dusk (#81234570)
//! 001 Harbor at dusk by kuroneko
//!     Saved: downloads/81234570.jpg (jpg, 1.2 MB)
//!     Source: https://www.pixiv.net/artworks/81234570
//!     2020/02/19 Daily Ranking #7
//!
//! Fetched 2 of 2 artworks
//! ```
//!
//! ## Verify
//!
//! ```text
//! 81234570.jpg: complete jpg (1.2 MB)
//!     2480x3508
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability. Format functions are pure: no I/O, no side effects.

use crate::acquire::{AcquireEvent, RunReport, SkipReason, StopReason};
use crate::imaging::{ContainerType, VerifiedImage};
use crate::types::ArtworkDescriptor;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: u32) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count with one decimal above a kilobyte.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// `title by artist`, dropping whichever part is empty.
fn artwork_heading(artwork: &ArtworkDescriptor) -> String {
    match (artwork.title.is_empty(), artwork.byline.is_empty()) {
        (false, false) => format!("{} by {}", artwork.title, artwork.byline),
        (false, true) => artwork.title.clone(),
        (true, false) => format!("(untitled) by {}", artwork.byline),
        (true, true) => format!("(#{})", artwork.token),
    }
}

fn skip_reason(reason: &SkipReason) -> String {
    match reason {
        SkipReason::NotFound => "no full-resolution image".to_string(),
        SkipReason::InvalidUrl => "unrecognized thumbnail URL".to_string(),
        SkipReason::FileTooLarge { bytes } => format!("file too large ({})", format_bytes(*bytes)),
        SkipReason::Corrupt(c) => format!(
            "incomplete {} download ({})",
            c.container.extension(),
            format_bytes(c.byte_length)
        ),
        SkipReason::UnknownContainer => "not a PNG or JPEG image".to_string(),
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// Format a single progress event from an acquisition run.
pub fn format_acquire_event(event: &AcquireEvent) -> Vec<String> {
    match event {
        AcquireEvent::Selected {
            index,
            target,
            id,
            title,
        } => vec![format!(
            "{}/{} {} (#{})",
            format_index(*index),
            format_index(*target),
            title,
            id
        )],
        AcquireEvent::Skipped { reason, .. } => {
            vec![format!("{}Skipped: {}", indent(1), skip_reason(reason))]
        }
        AcquireEvent::Saved {
            index,
            artwork,
            container,
            byte_length,
            cropped,
        } => {
            let mut detail = format!("{}, {}", container.extension(), format_bytes(*byte_length));
            if *cropped {
                detail.push_str(", cropped");
            }
            let mut lines = vec![
                format!("{} {}", format_index(*index), artwork_heading(artwork)),
                format!("{}Saved: {} ({})", indent(1), artwork.local_uri, detail),
                format!("{}Source: {}", indent(1), artwork.web_uri),
            ];
            if !artwork.attribution.is_empty() {
                lines.push(format!("{}{}", indent(1), artwork.attribution));
            }
            lines
        }
    }
}

/// Format the closing summary of a fetch run.
pub fn format_run_summary(report: &RunReport) -> Vec<String> {
    let collected = report.artworks.len() as u32;
    let requested = collected + report.shortfall;
    let mut lines = vec![
        String::new(),
        format!("Fetched {} of {} artworks", collected, requested),
    ];
    let reason = match &report.stop {
        StopReason::Completed => None,
        StopReason::SourceExhausted => Some("catalog has no more matching artworks".to_string()),
        StopReason::AttemptLimit => Some("too many artworks were skipped".to_string()),
        StopReason::Cancelled => Some("cancelled".to_string()),
        StopReason::Transport(e) => Some(format!("network error: {}", e)),
        StopReason::Failed(e) => Some(e.to_string()),
    };
    if let Some(reason) = reason {
        lines.push(format!("{}Stopped: {}", indent(1), reason));
    }
    if report.is_retryable() {
        lines.push(format!("{}Run again later to retry", indent(1)));
    }
    lines
}

// ============================================================================
// Verify / crop / forget
// ============================================================================

/// Format the result of checking a file's container.
///
/// ```text
/// 81234570.jpg: complete jpg (1.2 MB)
///     2480x3508
/// ```
pub fn format_inspection(
    path: &Path,
    verified: Option<&VerifiedImage>,
    dimensions: Option<(u32, u32)>,
) -> Vec<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let Some(v) = verified else {
        return vec![format!("{}: not a PNG or JPEG file", name)];
    };
    let mut lines = vec![format!(
        "{}: complete {} ({})",
        name,
        v.container().extension(),
        format_bytes(v.byte_length())
    )];
    if let Some((width, height)) = dimensions {
        lines.push(format!("{}{}x{}", indent(1), width, height));
    }
    lines
}

pub fn format_crop(source: &Path, output: Option<&Path>) -> Vec<String> {
    match output {
        None => vec![format!("{}: no border found", source.display())],
        Some(output) if output == source => vec![format!("{}: cropped", source.display())],
        Some(output) => vec![format!("{} → {}", source.display(), output.display())],
    }
}

pub fn format_forget(id: u64, removed: Option<&ArtworkDescriptor>) -> Vec<String> {
    match removed {
        Some(artwork) => vec![
            format!("Forgot {}", artwork_heading(artwork)),
            format!("{}#{} will not be fetched again", indent(1), id),
        ],
        None => vec![format!("#{} will not be fetched again", id)],
    }
}
