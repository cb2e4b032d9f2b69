//! # pixiv-fetch
//!
//! Picks a handful of artworks from pixiv, downloads them at full resolution
//! and hands them to a gallery. Each run collects a bounded number of items
//! that pass the configured filters and have not been fetched (or deleted)
//! before.
//!
//! # Architecture: One Pipeline, Swappable Edges
//!
//! ```text
//! CandidateSource ──► SelectionLoop ──► ExtensionResolver ──► DownloadStore
//!  (ranking/auth)      (filter, dedup)    (probe .jpg/.png)     (<token>.part)
//!                                                                   │
//!          Gallery ◄── ArtworkDescriptor ◄── crop? ◄── verify trailer
//! ```
//!
//! Everything that talks to the outside world sits behind a trait:
//! [`http::HttpFetch`], [`source::CandidateSource`],
//! [`registry::DuplicateRegistry`], [`gallery::Gallery`],
//! [`auth::TokenProvider`] and [`imaging::ImageBackend`]. The pipeline itself
//! is plain sequential code over those traits, so tests drive it end to end
//! with in-memory mocks and a seeded RNG.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`acquire`] | Top-level run: select, resolve, download, verify, crop |
//! | [`selection`] | Shuffled page scan with pagination on exhaustion |
//! | [`filter`] | Ordered predicate chain deciding whether a candidate is acceptable |
//! | [`source`] | Catalog feeds: public rankings and token-protected app API feeds |
//! | [`resolver`] | Thumbnail URL → full-resolution URL, probing extensions in order |
//! | [`registry`] | "Already have it" / "user deleted it" lookups |
//! | [`imaging`] | Container identification, trailer verification, border cropping |
//! | [`storage`] | Download directory with part files |
//! | [`gallery`] | JSON gallery manifest, publish, run lock |
//! | [`auth`] | Access tokens and the fallback when there is none |
//! | [`http`] | Blocking HTTP over `ureq`, plus the mock used in tests |
//! | [`config`] | `config.toml` loading, validation, and stock defaults |
//! | [`types`] | Shared data model: candidates, criteria, descriptors |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Verify Before Naming
//!
//! Downloads are streamed to `<token>.part` and only renamed once the PNG
//! `IEND` chunk or JPEG `EOI` marker has been found at the end. Truncated
//! transfers are the common failure on flaky connections; they are discarded
//! and the run moves on to another artwork.
//!
//! ## Probing Instead of Asking
//!
//! Ranking entries only carry a thumbnail URL. The original lives at a
//! predictable path on `i.pximg.net` but its extension is unknown, so the
//! resolver tries each configured extension in order and keeps the first
//! response that succeeds. The order matters: most originals are JPEG, so
//! `.jpg` first usually costs one request.
//!
//! ## Failures Are Classified, Not Retried
//!
//! A run never sleeps and retries. Skip-class failures (no original, corrupt
//! download, file too large) move on to the next candidate, bounded by
//! [`acquire::ATTEMPTS_PER_ITEM`]. Run-class failures stop the run, keep what
//! was collected, and mark the report retryable; the CLI turns that into exit
//! code 75 so cron or a systemd timer can back off and try again.

pub mod acquire;
pub mod auth;
pub mod config;
pub mod filter;
pub mod gallery;
pub mod http;
pub mod imaging;
pub mod output;
pub mod registry;
pub mod resolver;
pub mod selection;
pub mod source;
pub mod storage;
pub mod types;
