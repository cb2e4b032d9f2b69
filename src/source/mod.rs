//! Catalog feeds that supply candidates page by page.
//!
//! Two families exist:
//!
//! | Source | Needs token | Pagination |
//! |---|---|---|
//! | [`AuthFeed`] (follow, bookmark, recommended, artist, tag search) | yes | opaque `next_url` cursor, unbounded |
//! | [`RankingFeed`] (daily, weekly, ...) | no | pages 1..=9 of a day, then the previous day |
//!
//! Both return [`CandidatePage`]s whose [`Continuation`] tells the selection
//! loop how to ask for more.

pub mod auth_feed;
pub mod ranking;

pub use auth_feed::{AuthFeed, AuthFeedMode};
pub use ranking::{RankingFeed, RankingMode};

use crate::http::TransportError;
use crate::types::{Candidate, CandidatePage, Continuation};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {message}")]
    Payload { url: String, message: String },
}

impl SourceError {
    /// Authentication problems show up as 400/401/403 on the app API.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SourceError::Status { status, .. } if matches!(status, 400 | 401 | 403))
    }
}

/// A paginated catalog feed.
pub trait CandidateSource {
    fn first_page(&mut self) -> Result<CandidatePage, SourceError>;

    /// Fetch the page `continuation` points at. `Continuation::End` yields an
    /// empty final page.
    fn next_page(&mut self, continuation: &Continuation) -> Result<CandidatePage, SourceError>;

    /// Human-readable provenance line shown next to the artwork.
    fn attribution(&self, candidate: &Candidate) -> String;
}

impl<T: CandidateSource + ?Sized> CandidateSource for Box<T> {
    fn first_page(&mut self) -> Result<CandidatePage, SourceError> {
        (**self).first_page()
    }

    fn next_page(&mut self, continuation: &Continuation) -> Result<CandidatePage, SourceError> {
        (**self).next_page(continuation)
    }

    fn attribution(&self, candidate: &Candidate) -> String {
        (**self).attribution(candidate)
    }
}

/// Everything the `catalog.mode` setting can name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    Follow,
    Bookmark,
    Recommended,
    Artist,
    TagSearch,
    #[default]
    Daily,
    Weekly,
    Monthly,
    Rookie,
    Original,
    Male,
    Female,
}

impl UpdateMode {
    /// The ranking this mode reads, or `None` for the token-protected feeds.
    pub fn ranking_mode(self) -> Option<RankingMode> {
        match self {
            UpdateMode::Daily => Some(RankingMode::Daily),
            UpdateMode::Weekly => Some(RankingMode::Weekly),
            UpdateMode::Monthly => Some(RankingMode::Monthly),
            UpdateMode::Rookie => Some(RankingMode::Rookie),
            UpdateMode::Original => Some(RankingMode::Original),
            UpdateMode::Male => Some(RankingMode::Male),
            UpdateMode::Female => Some(RankingMode::Female),
            UpdateMode::Follow
            | UpdateMode::Bookmark
            | UpdateMode::Recommended
            | UpdateMode::Artist
            | UpdateMode::TagSearch => None,
        }
    }

    pub fn requires_auth(self) -> bool {
        self.ranking_mode().is_none()
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body).map_err(|e| SourceError::Payload {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Accepts `123` or `"123"`; the ranking API is inconsistent about it.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Accepts a string, `false`, or `null`; only a string is a value.
fn string_or_false<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Accepts a number, `false`, or `null`; only a number is a value.
fn number_or_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok()))
}
