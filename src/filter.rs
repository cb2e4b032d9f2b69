//! Candidate filtering.
//!
//! The chain is an ordered table of named predicates. Evaluation stops at the
//! first failing predicate and reports which one it was. Cheap checks run
//! before the registry lookups.
//!
//! | # | Predicate | Rejects when |
//! |---|---|---|
//! | 1 | duplicate | the destination already holds the id |
//! | 2 | category | manga while manga is not allowed |
//! | 3 | aspect | orientation does not match the requested mode |
//! | 4 | size | below `min_width`/`min_height` × 10 (per orientation) |
//! | 5 | views | below `min_views` × 500 |
//! | 6 | deleted | the user removed the id before |
//! | 7 | rating | content rating not in the accepted set |
//!
//! The recommended feed only serves safe works, so [`criteria_for_mode`]
//! turns the rating check off for it.

use crate::registry::DuplicateRegistry;
use crate::source::UpdateMode;
use crate::types::{AllowedRatings, AspectRatioMode, Candidate, Category, FilterCriteria};
use std::fmt;

/// Pixel dimensions are configured in tens of pixels.
pub const SIZE_UNIT: u32 = 10;
/// View counts are configured in units of 500.
pub const VIEWS_UNIT: u64 = 500;
const BYTES_PER_MB: u64 = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Duplicate,
    Category,
    Aspect,
    Size,
    Views,
    Deleted,
    Rating,
    /// Image exceeds `max_file_size_mb`. Only known after resolution.
    FileSize,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rejection::Duplicate => "duplicate",
            Rejection::Category => "manga",
            Rejection::Aspect => "aspect ratio",
            Rejection::Size => "too small",
            Rejection::Views => "too few views",
            Rejection::Deleted => "previously deleted",
            Rejection::Rating => "content rating",
            Rejection::FileSize => "file too large",
        };
        f.write_str(name)
    }
}

type Predicate = fn(&Candidate, &FilterCriteria, &dyn DuplicateRegistry) -> bool;

const CHAIN: [(Rejection, Predicate); 7] = [
    (Rejection::Duplicate, not_duplicate),
    (Rejection::Category, |c, f, _| category_allowed(c, f)),
    (Rejection::Aspect, |c, f, _| aspect_allowed(c, f)),
    (Rejection::Size, |c, f, _| size_allowed(c, f)),
    (Rejection::Views, |c, f, _| views_allowed(c, f)),
    (Rejection::Deleted, not_deleted),
    (Rejection::Rating, |c, f, _| rating_allowed(c, f)),
];

fn not_duplicate(c: &Candidate, _: &FilterCriteria, registry: &dyn DuplicateRegistry) -> bool {
    !registry.is_duplicate(c.id)
}

fn not_deleted(c: &Candidate, _: &FilterCriteria, registry: &dyn DuplicateRegistry) -> bool {
    !registry.was_deleted(c.id)
}

/// Criteria to use for a run in `mode`.
pub fn criteria_for_mode(criteria: &FilterCriteria, mode: UpdateMode) -> FilterCriteria {
    let mut effective = criteria.clone();
    if mode == UpdateMode::Recommended {
        effective.allowed_ratings = AllowedRatings::everything();
    }
    effective
}

/// Run the full chain. `Ok(())` means the candidate may be selected.
pub fn evaluate(
    candidate: &Candidate,
    criteria: &FilterCriteria,
    registry: &dyn DuplicateRegistry,
) -> Result<(), Rejection> {
    match CHAIN
        .iter()
        .find(|(_, passes)| !passes(candidate, criteria, registry))
    {
        Some((rejection, _)) => Err(*rejection),
        None => Ok(()),
    }
}

pub fn category_allowed(candidate: &Candidate, criteria: &FilterCriteria) -> bool {
    criteria.allow_manga || candidate.category != Category::Manga
}

/// Squares pass both orientations.
pub fn aspect_allowed(candidate: &Candidate, criteria: &FilterCriteria) -> bool {
    match criteria.aspect_ratio {
        AspectRatioMode::Any => true,
        AspectRatioMode::Landscape => candidate.height <= candidate.width,
        AspectRatioMode::Portrait => candidate.height >= candidate.width,
    }
}

/// Landscape mode only constrains width and portrait mode only height.
pub fn size_allowed(candidate: &Candidate, criteria: &FilterCriteria) -> bool {
    let min_width = u64::from(criteria.min_width) * u64::from(SIZE_UNIT);
    let min_height = u64::from(criteria.min_height) * u64::from(SIZE_UNIT);
    let wide_enough = u64::from(candidate.width) >= min_width;
    let tall_enough = u64::from(candidate.height) >= min_height;
    match criteria.aspect_ratio {
        AspectRatioMode::Any => wide_enough && tall_enough,
        AspectRatioMode::Landscape => wide_enough,
        AspectRatioMode::Portrait => tall_enough,
    }
}

pub fn views_allowed(candidate: &Candidate, criteria: &FilterCriteria) -> bool {
    candidate.view_count >= u64::from(criteria.min_views) * VIEWS_UNIT
}

pub fn rating_allowed(candidate: &Candidate, criteria: &FilterCriteria) -> bool {
    let ratings = &criteria.allowed_ratings;
    ratings.covers_everything() || ratings.accepts(candidate.content_rating)
}

/// Size limit checked once the image response is known. An unknown length
/// passes; a disabled limit (`None` or 0) passes everything.
pub fn file_size_allowed(content_length: Option<u64>, criteria: &FilterCriteria) -> bool {
    match (criteria.max_file_size_mb, content_length) {
        (Some(limit), Some(length)) if limit > 0 => length <= u64::from(limit) * BYTES_PER_MB,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use crate::types::fixtures::candidate;
    use crate::types::ContentRating;
    use std::collections::BTreeSet;

    fn permissive() -> FilterCriteria {
        FilterCriteria::permissive()
    }

    #[test]
    fn fresh_candidate_passes_permissive_criteria() {
        let registry = MemoryRegistry::new();
        assert_eq!(evaluate(&candidate(1), &permissive(), &registry), Ok(()));
    }

    #[test]
    fn duplicate_is_checked_first() {
        let mut c = candidate(1);
        c.category = Category::Manga;
        let registry = MemoryRegistry::with_present([1]);
        let criteria = FilterCriteria::default();
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Duplicate));
    }

    #[test]
    fn manga_rejected_unless_allowed() {
        let mut c = candidate(1);
        c.category = Category::Manga;
        let registry = MemoryRegistry::new();

        let mut criteria = permissive();
        criteria.allow_manga = false;
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Category));

        criteria.allow_manga = true;
        assert_eq!(evaluate(&c, &criteria, &registry), Ok(()));
    }

    #[test]
    fn aspect_modes() {
        let mut criteria = permissive();
        let wide = candidate(1); // 1000x800
        let mut tall = candidate(2);
        tall.width = 800;
        tall.height = 1000;
        let mut square = candidate(3);
        square.height = square.width;

        criteria.aspect_ratio = AspectRatioMode::Landscape;
        assert!(aspect_allowed(&wide, &criteria));
        assert!(!aspect_allowed(&tall, &criteria));
        assert!(aspect_allowed(&square, &criteria));

        criteria.aspect_ratio = AspectRatioMode::Portrait;
        assert!(!aspect_allowed(&wide, &criteria));
        assert!(aspect_allowed(&tall, &criteria));
        assert!(aspect_allowed(&square, &criteria));

        criteria.aspect_ratio = AspectRatioMode::Any;
        assert!(aspect_allowed(&wide, &criteria) && aspect_allowed(&tall, &criteria));
    }

    #[test]
    fn size_uses_tens_of_pixels() {
        let mut criteria = permissive();
        criteria.min_width = 100;
        criteria.min_height = 80;
        assert!(size_allowed(&candidate(1), &criteria));

        criteria.min_height = 81;
        assert!(!size_allowed(&candidate(1), &criteria));
    }

    #[test]
    fn landscape_ignores_height_minimum() {
        let mut criteria = permissive();
        criteria.aspect_ratio = AspectRatioMode::Landscape;
        criteria.min_width = 100;
        criteria.min_height = 500;
        assert!(size_allowed(&candidate(1), &criteria));

        criteria.min_width = 101;
        assert!(!size_allowed(&candidate(1), &criteria));
    }

    #[test]
    fn portrait_ignores_width_minimum() {
        let mut criteria = permissive();
        criteria.aspect_ratio = AspectRatioMode::Portrait;
        criteria.min_width = 500;
        criteria.min_height = 80;
        assert!(size_allowed(&candidate(1), &criteria));
    }

    #[test]
    fn views_boundary_at_one_unit() {
        let mut criteria = permissive();
        criteria.min_views = 1;
        let registry = MemoryRegistry::new();

        let mut c = candidate(1);
        c.view_count = 499;
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Views));

        c.view_count = 500;
        assert_eq!(evaluate(&c, &criteria, &registry), Ok(()));
    }

    #[test]
    fn deleted_rejected_after_cheap_checks() {
        let registry = MemoryRegistry::with_deleted([1]);
        let mut c = candidate(1);
        assert_eq!(
            evaluate(&c, &permissive(), &registry),
            Err(Rejection::Deleted)
        );

        // A failing cheaper predicate wins over the deleted check.
        c.view_count = 0;
        let mut criteria = permissive();
        criteria.min_views = 1;
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Views));
    }

    #[test]
    fn rating_levels_and_restricted() {
        let registry = MemoryRegistry::new();
        let mut criteria = permissive();
        criteria.allowed_ratings = AllowedRatings {
            levels: BTreeSet::from([2, 4]),
            allow_restricted: false,
        };

        let mut c = candidate(1);
        c.content_rating = ContentRating::Graduated(4);
        assert_eq!(evaluate(&c, &criteria, &registry), Ok(()));

        c.content_rating = ContentRating::Graduated(6);
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Rating));

        c.content_rating = ContentRating::Restricted;
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Rating));

        criteria.allowed_ratings.allow_restricted = true;
        assert_eq!(evaluate(&c, &criteria, &registry), Ok(()));
    }

    #[test]
    fn recommended_feed_skips_rating_check() {
        let registry = MemoryRegistry::new();
        let criteria = FilterCriteria::default();
        let mut c = candidate(1);
        c.content_rating = ContentRating::Graduated(6);
        assert_eq!(evaluate(&c, &criteria, &registry), Err(Rejection::Rating));

        let recommended = criteria_for_mode(&criteria, UpdateMode::Recommended);
        assert_eq!(evaluate(&c, &recommended, &registry), Ok(()));
        assert_eq!(recommended.allow_manga, criteria.allow_manga);

        let follow = criteria_for_mode(&criteria, UpdateMode::Follow);
        assert_eq!(follow, criteria);
    }

    #[test]
    fn full_domain_admits_unlisted_levels() {
        let mut c = candidate(1);
        c.content_rating = ContentRating::Graduated(5);
        assert!(rating_allowed(&c, &permissive()));
    }

    #[test]
    fn file_size_limit() {
        let mut criteria = permissive();
        assert!(file_size_allowed(Some(u64::MAX), &criteria));

        criteria.max_file_size_mb = Some(0);
        assert!(file_size_allowed(Some(u64::MAX), &criteria));

        criteria.max_file_size_mb = Some(2);
        assert!(file_size_allowed(Some(2 * 1_048_576), &criteria));
        assert!(!file_size_allowed(Some(2 * 1_048_576 + 1), &criteria));
        assert!(file_size_allowed(None, &criteria));
    }

    #[test]
    fn rejection_names() {
        assert_eq!(Rejection::Views.to_string(), "too few views");
    }
}
