//! Public ranking feed (`ranking.php?format=json`).
//!
//! Each ranking day is served 50 entries per page. Only the first nine pages
//! are walked: past that the API switches field types in ways that are not
//! worth chasing. Once a day is used up the feed moves to `prev_date`, page 1.

use super::{
    CandidateSource, SourceError, number_or_false, number_or_string, parse_json, string_or_false,
};
use crate::http::HttpFetch;
use crate::types::{Candidate, CandidatePage, Category, ContentRating, Continuation};
use serde::{Deserialize, Serialize};

pub const RANKING_URL: &str = "https://www.pixiv.net/ranking.php";
/// Pages walked per ranking day.
pub const RANKING_PAGES: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    Daily,
    Weekly,
    Monthly,
    Rookie,
    Original,
    Male,
    Female,
}

impl RankingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingMode::Daily => "daily",
            RankingMode::Weekly => "weekly",
            RankingMode::Monthly => "monthly",
            RankingMode::Rookie => "rookie",
            RankingMode::Original => "original",
            RankingMode::Male => "male",
            RankingMode::Female => "female",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RankingMode::Daily => "Daily Ranking",
            RankingMode::Weekly => "Weekly Ranking",
            RankingMode::Monthly => "Monthly Ranking",
            RankingMode::Rookie => "Rookie Ranking",
            RankingMode::Original => "Original Ranking",
            RankingMode::Male => "Popular Among Males",
            RankingMode::Female => "Popular Among Females",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RankingPayload {
    #[serde(default)]
    contents: Vec<RankingEntry>,
    date: String,
    #[serde(default, deserialize_with = "string_or_false")]
    prev_date: Option<String>,
    page: u32,
    #[serde(default, deserialize_with = "number_or_false")]
    next: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RankingEntry {
    illust_id: u64,
    title: String,
    user_name: String,
    url: String,
    width: u32,
    height: u32,
    #[serde(default)]
    view_count: u64,
    rank: u32,
    #[serde(default, deserialize_with = "number_or_string")]
    illust_type: u64,
    #[serde(default)]
    illust_content_type: ContentType,
}

#[derive(Debug, Default, Deserialize)]
struct ContentType {
    #[serde(default)]
    sexual: u8,
}

impl RankingEntry {
    fn into_candidate(self, date: &str) -> Candidate {
        Candidate {
            id: self.illust_id,
            title: self.title,
            author_name: self.user_name,
            width: self.width,
            height: self.height,
            view_count: self.view_count,
            // Rankings only distinguish safe from suggestive.
            content_rating: if self.illust_content_type.sexual == 0 {
                ContentRating::Graduated(2)
            } else {
                ContentRating::Graduated(6)
            },
            category: if self.illust_type == 1 {
                Category::Manga
            } else {
                Category::Illustration
            },
            thumbnail_url: self.url,
            rank: Some(self.rank),
            page_date: Some(date.to_string()),
            image_urls: Vec::new(),
        }
    }
}

/// Where to go after `page` of `date`.
///
/// A day with fewer than nine pages reports `next: false` on its last page;
/// it is treated as the ninth so the feed moves on to the previous day.
fn continuation_after(
    page: u32,
    has_next: bool,
    date: String,
    prev_date: Option<String>,
) -> Continuation {
    let page = if has_next { page } else { RANKING_PAGES };
    if page >= RANKING_PAGES && prev_date.is_none() {
        return Continuation::End;
    }
    Continuation::Ranking {
        page,
        date,
        prev_date,
    }
}

pub struct RankingFeed<H> {
    http: H,
    mode: RankingMode,
    base_url: String,
}

impl<H: HttpFetch> RankingFeed<H> {
    pub fn new(http: H, mode: RankingMode) -> Self {
        Self::with_base_url(http, mode, RANKING_URL)
    }

    pub fn with_base_url(http: H, mode: RankingMode, base_url: impl Into<String>) -> Self {
        Self {
            http,
            mode,
            base_url: base_url.into(),
        }
    }

    pub fn mode(&self) -> RankingMode {
        self.mode
    }

    fn page_url(&self, page: u32, date: Option<&str>) -> String {
        let mut url = format!(
            "{}?format=json&mode={}&p={}",
            self.base_url,
            self.mode.as_str(),
            page
        );
        if let Some(date) = date {
            url.push_str("&date=");
            url.push_str(date);
        }
        url
    }

    fn fetch(&self, page: u32, date: Option<&str>) -> Result<CandidatePage, SourceError> {
        let url = self.page_url(page, date);
        log::debug!("Fetching ranking page {url}");
        let response = self.http.get(&url, &[])?;
        if !response.is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status,
            });
        }
        let body = response.into_string(&url)?;
        let payload: RankingPayload = parse_json(&url, &body)?;

        let candidates = payload
            .contents
            .into_iter()
            .map(|entry| entry.into_candidate(&payload.date))
            .collect();
        Ok(CandidatePage {
            candidates,
            continuation: continuation_after(
                payload.page,
                payload.next.is_some(),
                payload.date,
                payload.prev_date,
            ),
        })
    }
}

fn end_page() -> CandidatePage {
    CandidatePage {
        candidates: Vec::new(),
        continuation: Continuation::End,
    }
}

impl<H: HttpFetch> CandidateSource for RankingFeed<H> {
    fn first_page(&mut self) -> Result<CandidatePage, SourceError> {
        self.fetch(1, None)
    }

    fn next_page(&mut self, continuation: &Continuation) -> Result<CandidatePage, SourceError> {
        match continuation {
            Continuation::Ranking { page, date, .. } if *page < RANKING_PAGES => {
                self.fetch(page + 1, Some(date.as_str()))
            }
            Continuation::Ranking {
                prev_date: Some(prev),
                ..
            } => self.fetch(1, Some(prev.as_str())),
            Continuation::Ranking { .. } | Continuation::End => Ok(end_page()),
            Continuation::Cursor(url) => {
                log::warn!("Ranking feed cannot follow cursor {url}");
                Ok(end_page())
            }
        }
    }

    fn attribution(&self, candidate: &Candidate) -> String {
        let date = candidate
            .page_date
            .as_deref()
            .map(format_date)
            .unwrap_or_default();
        let rank = candidate
            .rank
            .map(|r| format!(" #{r}"))
            .unwrap_or_default();
        format!("{date} {}{rank}", self.mode.label())
            .trim_start()
            .to_string()
    }
}

/// `20200219` → `2020/02/19`. Anything else is passed through.
fn format_date(date: &str) -> String {
    if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}/{}/{}", &date[..4], &date[4..6], &date[6..])
    } else {
        date.to_string()
    }
}
