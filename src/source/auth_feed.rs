//! Token-protected feeds on the app API.
//!
//! Every response carries a `next_url` which is followed verbatim; there is
//! no page limit. Entries already know their original-resolution URLs, so no
//! extension probing is needed for them.

use super::{CandidateSource, SourceError, parse_json};
use crate::http::HttpFetch;
use crate::types::{Candidate, CandidatePage, Category, ContentRating, Continuation};
use serde::Deserialize;

pub const APP_API_URL: &str = "https://app-api.pixiv.net";

/// Which authenticated feed to read, with the parameter it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFeedMode {
    Follow,
    Bookmark { user_id: String },
    Recommended,
    Artist { artist_id: String },
    TagSearch { tag: String },
}

impl AuthFeedMode {
    fn path_and_query(&self) -> String {
        match self {
            AuthFeedMode::Follow => "/v2/illust/follow?restrict=public".to_string(),
            AuthFeedMode::Bookmark { user_id } => format!(
                "/v1/user/bookmarks/illust?user_id={}&restrict=public",
                urlencoding::encode(user_id)
            ),
            AuthFeedMode::Recommended => {
                "/v1/illust/recommended?content_type=illust&filter=for_android".to_string()
            }
            AuthFeedMode::Artist { artist_id } => format!(
                "/v1/user/illusts?user_id={}&filter=for_android",
                urlencoding::encode(artist_id)
            ),
            AuthFeedMode::TagSearch { tag } => format!(
                "/v1/search/illust?word={}&search_target=partial_match_for_tags&sort=date_desc&filter=for_android",
                urlencoding::encode(tag)
            ),
        }
    }

    fn label(&self) -> String {
        match self {
            AuthFeedMode::Follow => "Following".to_string(),
            AuthFeedMode::Bookmark { .. } => "Bookmarks".to_string(),
            AuthFeedMode::Recommended => "Recommended".to_string(),
            AuthFeedMode::Artist { .. } => "Artist".to_string(),
            AuthFeedMode::TagSearch { tag } => format!("Tag: {tag}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IllustsPayload {
    #[serde(default)]
    illusts: Vec<AuthIllust>,
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthIllust {
    id: u64,
    title: String,
    #[serde(rename = "type")]
    kind: String,
    image_urls: PreviewUrls,
    user: User,
    width: u32,
    height: u32,
    #[serde(default)]
    sanity_level: u8,
    #[serde(default)]
    x_restrict: u8,
    #[serde(default)]
    total_view: u64,
    #[serde(default)]
    meta_single_page: MetaSinglePage,
    #[serde(default)]
    meta_pages: Vec<MetaPage>,
}

#[derive(Debug, Deserialize)]
struct PreviewUrls {
    #[serde(default)]
    medium: String,
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct MetaSinglePage {
    original_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaPage {
    image_urls: MetaPageUrls,
}

#[derive(Debug, Deserialize)]
struct MetaPageUrls {
    original: String,
}

impl AuthIllust {
    fn into_candidate(self) -> Candidate {
        // Single works use meta_single_page; albums list each page instead.
        let image_urls = if self.meta_pages.is_empty() {
            self.meta_single_page.original_image_url.into_iter().collect()
        } else {
            self.meta_pages
                .into_iter()
                .map(|p| p.image_urls.original)
                .collect()
        };
        Candidate {
            id: self.id,
            title: self.title,
            author_name: self.user.name,
            width: self.width,
            height: self.height,
            view_count: self.total_view,
            content_rating: if self.x_restrict >= 1 {
                ContentRating::Restricted
            } else {
                ContentRating::Graduated(self.sanity_level)
            },
            category: if self.kind == "manga" {
                Category::Manga
            } else {
                Category::Illustration
            },
            thumbnail_url: self.image_urls.large.unwrap_or(self.image_urls.medium),
            rank: None,
            page_date: None,
            image_urls,
        }
    }
}

pub struct AuthFeed<H> {
    http: H,
    token: String,
    mode: AuthFeedMode,
    api_url: String,
}

impl<H: HttpFetch> AuthFeed<H> {
    pub fn new(http: H, token: impl Into<String>, mode: AuthFeedMode) -> Self {
        Self::with_api_url(http, token, mode, APP_API_URL)
    }

    pub fn with_api_url(
        http: H,
        token: impl Into<String>,
        mode: AuthFeedMode,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token: token.into(),
            mode,
            api_url: api_url.into(),
        }
    }

    fn fetch(&self, url: &str) -> Result<CandidatePage, SourceError> {
        log::debug!("Fetching feed page {url}");
        let authorization = format!("Bearer {}", self.token);
        let response = self.http.get(
            url,
            &[
                ("Authorization", authorization.as_str()),
                ("App-OS", "android"),
            ],
        )?;
        if !response.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }
        let body = response.into_string(url)?;
        let payload: IllustsPayload = parse_json(url, &body)?;

        Ok(CandidatePage {
            candidates: payload
                .illusts
                .into_iter()
                .map(AuthIllust::into_candidate)
                .collect(),
            continuation: match payload.next_url {
                Some(next) if !next.is_empty() => Continuation::Cursor(next),
                _ => Continuation::End,
            },
        })
    }
}

impl<H: HttpFetch> CandidateSource for AuthFeed<H> {
    fn first_page(&mut self) -> Result<CandidatePage, SourceError> {
        let url = format!("{}{}", self.api_url, self.mode.path_and_query());
        self.fetch(&url)
    }

    fn next_page(&mut self, continuation: &Continuation) -> Result<CandidatePage, SourceError> {
        match continuation {
            Continuation::Cursor(url) => self.fetch(url),
            other => {
                if !matches!(other, Continuation::End) {
                    log::warn!("Feed cannot follow {other:?}");
                }
                Ok(CandidatePage {
                    candidates: Vec::new(),
                    continuation: Continuation::End,
                })
            }
        }
    }

    fn attribution(&self, _candidate: &Candidate) -> String {
        self.mode.label()
    }
}
