//! Shared types passed between the catalog sources, the selection loop and
//! the acquisition pipeline.
//!
//! Candidates and pages are created per network response and dropped once the
//! selection loop has consumed them. [`ArtworkDescriptor`] is the only type
//! that outlives a run: it is serialized into the gallery manifest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Web page of an artwork; the numeric id is appended.
pub const ARTWORK_WEB_URL: &str = "https://www.pixiv.net/artworks/";

/// Graduated sanity levels reported by the catalog, lowest to highest.
pub const GRADUATED_LEVELS: [u8; 3] = [2, 4, 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Illustration,
    Manga,
}

/// Content rating normalized across both catalog families.
///
/// The authenticated API reports a graduated `sanity_level` (2, 4, 6) and a
/// separate `x_restrict` flag. The flag sits above the graduated scale and is
/// never compared numerically against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentRating {
    Graduated(u8),
    Restricted,
}

/// One catalog entry considered for selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: u64,
    pub title: String,
    pub author_name: String,
    pub width: u32,
    pub height: u32,
    pub view_count: u64,
    pub content_rating: ContentRating,
    pub category: Category,
    /// Low resolution CDN URL. Always present for ranking entries.
    pub thumbnail_url: String,
    /// Position in the ranking (ranking feed only).
    pub rank: Option<u32>,
    /// `YYYYMMDD` of the ranking page this entry came from (ranking feed only).
    pub page_date: Option<String>,
    /// Original-resolution URLs known up front, one per page of a multi-page
    /// work. Empty for ranking entries, which only carry a thumbnail.
    pub image_urls: Vec<String>,
}

impl Candidate {
    /// Original-resolution URL to download directly, if the source supplied one.
    pub fn original_url(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }

    pub fn token(&self) -> String {
        self.id.to_string()
    }

    pub fn web_uri(&self) -> String {
        format!("{ARTWORK_WEB_URL}{}", self.id)
    }
}

/// Where the next page of candidates comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Authenticated feed: the `next_url` returned by the previous response.
    Cursor(String),
    /// Ranking feed: the page just served and the dates needed to move on.
    Ranking {
        page: u32,
        date: String,
        prev_date: Option<String>,
    },
    /// The source has nothing further to offer.
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePage {
    pub candidates: Vec<Candidate>,
    pub continuation: Continuation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatioMode {
    #[default]
    Any,
    Landscape,
    Portrait,
}

/// Which content ratings the user accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllowedRatings {
    /// Accepted graduated sanity levels.
    pub levels: BTreeSet<u8>,
    /// Accept restricted (R-18) works.
    pub allow_restricted: bool,
}

impl AllowedRatings {
    pub fn everything() -> Self {
        Self {
            levels: GRADUATED_LEVELS.into_iter().collect(),
            allow_restricted: true,
        }
    }

    /// True when every rating the catalog can report is accepted.
    pub fn covers_everything(&self) -> bool {
        self.allow_restricted && GRADUATED_LEVELS.iter().all(|l| self.levels.contains(l))
    }

    pub fn accepts(&self, rating: ContentRating) -> bool {
        match rating {
            ContentRating::Graduated(level) => self.levels.contains(&level),
            ContentRating::Restricted => self.allow_restricted,
        }
    }
}

impl Default for AllowedRatings {
    fn default() -> Self {
        Self {
            levels: BTreeSet::from([2]),
            allow_restricted: false,
        }
    }
}

/// Filter settings, read once per run.
///
/// Sizes are in tens of pixels and views in units of 500, matching the
/// slider units users configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterCriteria {
    pub allow_manga: bool,
    pub allowed_ratings: AllowedRatings,
    pub aspect_ratio: AspectRatioMode,
    pub min_views: u32,
    pub min_width: u32,
    pub min_height: u32,
    /// Upper bound on the downloaded file in megabytes. `None` or 0 disables it.
    pub max_file_size_mb: Option<u32>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            allow_manga: false,
            allowed_ratings: AllowedRatings::default(),
            aspect_ratio: AspectRatioMode::Any,
            min_views: 0,
            min_width: 0,
            min_height: 0,
            max_file_size_mb: None,
        }
    }
}

impl FilterCriteria {
    /// Criteria that let every fresh candidate through.
    pub fn permissive() -> Self {
        Self {
            allow_manga: true,
            allowed_ratings: AllowedRatings::everything(),
            ..Self::default()
        }
    }
}

/// Final output unit handed to the destination gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkDescriptor {
    /// Stringified candidate id, used for gallery-side dedup.
    pub token: String,
    pub title: String,
    pub byline: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub attribution: String,
    pub local_uri: String,
    pub web_uri: String,
}

/// Cooperative cancellation flag shared between a run and whoever stops it.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel from a background thread once `limit` has passed.
    ///
    /// The timer thread is detached; cancelling an already finished run is
    /// harmless.
    pub fn cancel_after(&self, limit: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(limit);
            log::warn!("Time limit of {}s reached, stopping", limit.as_secs());
            token.cancel();
        });
    }
}
