//! Picking one acceptable candidate at a time.
//!
//! A [`SelectionLoop`] owns the page it is currently scanning. Each page is
//! shuffled once when it arrives and then scanned front to back, so repeated
//! calls within a run pick up where the previous match left off instead of
//! refetching. When the page runs dry the loop asks the source for the next
//! one and keeps going until something passes or the source reports the end.

use crate::filter::{self, Rejection};
use crate::registry::DuplicateRegistry;
use crate::source::{CandidateSource, SourceError};
use crate::types::{Candidate, Continuation, FilterCriteria};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("catalog exhausted without a matching candidate")]
    SourceExhausted,
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Result of scanning a single page.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Matched(Candidate),
    Exhausted,
}

/// First candidate in `page` that passes every filter, in page order.
pub fn scan_page(
    page: &[Candidate],
    criteria: &FilterCriteria,
    registry: &dyn DuplicateRegistry,
) -> SelectionOutcome {
    page.iter()
        .find(|c| passes(c, criteria, registry))
        .cloned()
        .map_or(SelectionOutcome::Exhausted, SelectionOutcome::Matched)
}

fn passes(candidate: &Candidate, criteria: &FilterCriteria, registry: &dyn DuplicateRegistry) -> bool {
    match filter::evaluate(candidate, criteria, registry) {
        Ok(()) => true,
        Err(reason) => {
            log::debug!("Rejected {}: {}", candidate.id, reason);
            false
        }
    }
}

pub struct SelectionLoop<S, R> {
    source: S,
    rng: R,
    page: Vec<Candidate>,
    position: usize,
    /// `None` until the first page has been requested.
    continuation: Option<Continuation>,
    /// Ids handed out during this run; the registry does not see them yet.
    selected: HashSet<u64>,
    pages_fetched: u32,
}

impl<S: CandidateSource, R: Rng> SelectionLoop<S, R> {
    pub fn new(source: S, rng: R) -> Self {
        Self {
            source,
            rng,
            page: Vec::new(),
            position: 0,
            continuation: None,
            selected: HashSet::new(),
            pages_fetched: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Next candidate that passes every filter.
    ///
    /// Source errors are returned as-is; nothing here retries.
    pub fn next_match(
        &mut self,
        criteria: &FilterCriteria,
        registry: &dyn DuplicateRegistry,
    ) -> Result<Candidate, SelectionError> {
        loop {
            while let Some(candidate) = self.page.get(self.position) {
                self.position += 1;
                if self.selected.contains(&candidate.id) {
                    log::debug!("Rejected {}: {}", candidate.id, Rejection::Duplicate);
                    continue;
                }
                if passes(candidate, criteria, registry) {
                    let candidate = candidate.clone();
                    self.selected.insert(candidate.id);
                    log::info!("Selected {} \"{}\"", candidate.id, candidate.title);
                    return Ok(candidate);
                }
            }
            self.advance()?;
        }
    }

    fn advance(&mut self) -> Result<(), SelectionError> {
        let page = match &self.continuation {
            None => self.source.first_page()?,
            Some(Continuation::End) => return Err(SelectionError::SourceExhausted),
            Some(continuation) => self.source.next_page(continuation)?,
        };
        self.pages_fetched += 1;
        log::debug!(
            "Page {} brought {} candidates",
            self.pages_fetched,
            page.candidates.len()
        );

        self.page = page.candidates;
        self.page.shuffle(&mut self.rng);
        self.position = 0;
        self.continuation = Some(page.continuation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockFetch;
    use crate::registry::MemoryRegistry;
    use crate::source::auth_feed::tests::illusts_json;
    use crate::source::ranking::tests::{ranking_json, ranking_url};
    use crate::source::{AuthFeed, AuthFeedMode, RankingFeed, RankingMode};
    use crate::types::fixtures::candidate;
    use crate::types::{AspectRatioMode, CandidatePage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Scripted source serving fixed pages and counting requests.
    struct PagedSource {
        pages: Vec<Vec<Candidate>>,
        served: usize,
    }

    impl PagedSource {
        fn new(pages: Vec<Vec<Candidate>>) -> Self {
            Self { pages, served: 0 }
        }

        fn serve(&mut self) -> CandidatePage {
            let candidates = self.pages.get(self.served).cloned().unwrap_or_default();
            self.served += 1;
            let continuation = if self.served < self.pages.len() {
                Continuation::Cursor(format!("page-{}", self.served))
            } else {
                Continuation::End
            };
            CandidatePage {
                candidates,
                continuation,
            }
        }
    }

    impl CandidateSource for PagedSource {
        fn first_page(&mut self) -> Result<CandidatePage, SourceError> {
            Ok(self.serve())
        }

        fn next_page(&mut self, _: &Continuation) -> Result<CandidatePage, SourceError> {
            Ok(self.serve())
        }

        fn attribution(&self, _: &Candidate) -> String {
            String::new()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn scan_page_returns_first_passing() {
        let mut small = candidate(1);
        small.width = 10;
        let page = vec![small, candidate(2), candidate(3)];
        let mut criteria = FilterCriteria::permissive();
        criteria.min_width = 50;

        assert_eq!(
            scan_page(&page, &criteria, &MemoryRegistry::new()),
            SelectionOutcome::Matched(candidate(2))
        );
        assert_eq!(
            scan_page(&page, &criteria, &MemoryRegistry::with_present([2, 3])),
            SelectionOutcome::Exhausted
        );
    }

    #[test]
    fn matched_candidate_passes_every_predicate() {
        let mut criteria = FilterCriteria::permissive();
        criteria.aspect_ratio = AspectRatioMode::Portrait;
        criteria.min_views = 3;

        let page: Vec<_> = (1..=20)
            .map(|id| {
                let mut c = candidate(id);
                if id % 2 == 0 {
                    std::mem::swap(&mut c.width, &mut c.height);
                }
                c.view_count = id * 100;
                c
            })
            .collect();
        let registry = MemoryRegistry::with_deleted([18]);
        let mut selection = SelectionLoop::new(PagedSource::new(vec![page]), rng());

        let mut found = Vec::new();
        while let Ok(c) = selection.next_match(&criteria, &registry) {
            assert_eq!(filter::evaluate(&c, &criteria, &registry), Ok(()));
            found.push(c.id);
        }
        found.sort();
        assert_eq!(found, vec![16, 20]);
    }

    #[test]
    fn second_match_continues_on_same_page() {
        let source = PagedSource::new(vec![vec![candidate(1), candidate(2), candidate(3)]]);
        let mut selection = SelectionLoop::new(source, rng());
        let criteria = FilterCriteria::permissive();
        let registry = MemoryRegistry::new();

        let a = selection.next_match(&criteria, &registry).unwrap();
        let b = selection.next_match(&criteria, &registry).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(selection.source().served, 1);
    }

    #[test]
    fn empty_pages_are_skipped() {
        let source = PagedSource::new(vec![vec![], vec![], vec![candidate(5)]]);
        let mut selection = SelectionLoop::new(source, rng());

        let c = selection
            .next_match(&FilterCriteria::permissive(), &MemoryRegistry::new())
            .unwrap();
        assert_eq!(c.id, 5);
        assert_eq!(selection.pages_fetched(), 3);
    }

    #[test]
    fn end_of_source_is_exhaustion() {
        let source = PagedSource::new(vec![vec![candidate(1)], vec![candidate(2)]]);
        let mut selection = SelectionLoop::new(source, rng());
        let registry = MemoryRegistry::with_present([1, 2]);

        assert!(matches!(
            selection.next_match(&FilterCriteria::permissive(), &registry),
            Err(SelectionError::SourceExhausted)
        ));
        assert_eq!(selection.source().served, 2);
    }

    #[test]
    fn ranking_exhaustion_walks_nine_pages_then_previous_day() {
        let mut fetch = MockFetch::new();
        let mut expected = Vec::new();
        let mut id = 0;
        for (date, prev, first_url_has_date) in [
            ("20200219", Some("20200218"), false),
            ("20200218", None, true),
        ] {
            for page in 1..=9 {
                let url = if page == 1 && !first_url_has_date {
                    ranking_url("daily", 1, None)
                } else {
                    ranking_url("daily", page, Some(date))
                };
                id += 1;
                fetch = fetch.respond(&url, 200, ranking_json("daily", page, date, prev, &[id]));
                expected.push(url);
            }
        }

        let mut selection = SelectionLoop::new(RankingFeed::new(&fetch, RankingMode::Daily), rng());
        // Every entry is already in the gallery.
        let registry = MemoryRegistry::with_present(1..=id);

        assert!(matches!(
            selection.next_match(&FilterCriteria::permissive(), &registry),
            Err(SelectionError::SourceExhausted)
        ));
        assert_eq!(fetch.urls(), expected);
        assert_eq!(selection.pages_fetched(), 18);
    }

    #[test]
    fn auth_cursor_is_followed_until_match() {
        let first = "https://app-api.pixiv.net/v1/illust/recommended?content_type=illust&filter=for_android";
        let next = "https://app-api.pixiv.net/v1/illust/recommended?offset=30";
        let fetch = MockFetch::new()
            .respond(first, 200, illusts_json(&[1, 2], Some(next)))
            .respond(next, 200, illusts_json(&[3], None));
        let feed = AuthFeed::new(&fetch, "tok", AuthFeedMode::Recommended);
        let mut selection = SelectionLoop::new(feed, rng());

        let c = selection
            .next_match(
                &FilterCriteria::permissive(),
                &MemoryRegistry::with_present([1, 2]),
            )
            .unwrap();
        assert_eq!(c.id, 3);
        assert_eq!(fetch.urls(), vec![first, next]);
    }

    #[test]
    fn transport_error_propagates_unchanged() {
        let fetch = MockFetch::new().fail(&ranking_url("daily", 1, None));
        let mut selection = SelectionLoop::new(RankingFeed::new(&fetch, RankingMode::Daily), rng());

        assert!(matches!(
            selection.next_match(&FilterCriteria::permissive(), &MemoryRegistry::new()),
            Err(SelectionError::Source(SourceError::Transport(_)))
        ));
    }
}
