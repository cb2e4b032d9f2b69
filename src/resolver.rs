//! Locating the full-resolution image behind a thumbnail.
//!
//! Ranking entries only carry a thumbnail URL such as
//!
//! ```text
//! https://tc-pximg01.techorus-cdn.com/c/240x480/img-master/img/2020/02/19/00/00/39/79583564_p0_master1200.jpg
//! ```
//!
//! The original lives under the same `/img/...` path on the origin host, minus
//! the `_master1200` suffix, but its extension is not known in advance:
//!
//! ```text
//! https://i.pximg.net/img-original/img/2020/02/19/00/00/39/79583564_p0.png
//! ```
//!
//! [`ExtensionResolver`] guesses extensions in order until one answers 2xx.
//! The origin refuses requests without a `Referer`, so every probe sends one.

use crate::http::{HttpFetch, HttpResponse, TransportError};
use crate::types::Candidate;
use thiserror::Error;

pub const ORIGINAL_HOST: &str = "https://i.pximg.net/img-original";
pub const DEFAULT_REFERER: &str = "https://app-api.pixiv.net/";
const IMG_SEGMENT: &str = "/img/";
const MASTER_SUFFIX: &str = "_master1200";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no full-resolution image found for {0}")]
    NotFound(String),
    #[error("thumbnail URL has no /img/ segment: {0}")]
    InvalidThumbnailUrl(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Extensionless original-resolution URL for a thumbnail URL.
pub fn full_resolution_base(thumbnail_url: &str) -> Result<String, ResolveError> {
    let start = thumbnail_url
        .find(IMG_SEGMENT)
        .ok_or_else(|| ResolveError::InvalidThumbnailUrl(thumbnail_url.to_string()))?;
    let path = thumbnail_url[start..].replace(MASTER_SUFFIX, "");

    // Drop ".jpg"/".png"; anything after the last slash without a dot is
    // already extensionless.
    let stem = match path.rfind('.') {
        Some(dot) if dot > path.rfind('/').unwrap_or(0) => &path[..dot],
        _ => path.as_str(),
    };
    Ok(format!("{ORIGINAL_HOST}{stem}"))
}

pub struct ExtensionResolver<H> {
    http: H,
    extensions: Vec<String>,
    referer: String,
}

impl<H: HttpFetch> ExtensionResolver<H> {
    pub fn new(http: H, extensions: Vec<String>, referer: impl Into<String>) -> Self {
        Self {
            http,
            extensions,
            referer: referer.into(),
        }
    }

    /// Default probe order `.jpg` then `.png`, with the app API as referer.
    pub fn with_defaults(http: H) -> Self {
        Self::new(
            http,
            vec![".jpg".to_string(), ".png".to_string()],
            DEFAULT_REFERER,
        )
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    /// Probe each extension in order and return the first 2xx response.
    ///
    /// Non-2xx answers are wrong guesses. A transport failure ends the probe
    /// sequence immediately.
    pub fn resolve_full_resolution(
        &self,
        thumbnail_url: &str,
    ) -> Result<(String, HttpResponse), ResolveError> {
        let base = full_resolution_base(thumbnail_url)?;
        for ext in &self.extensions {
            let url = format!("{base}{ext}");
            let response = self.fetch(&url)?;
            if response.is_success() {
                log::debug!("Found original at {url}");
                return Ok((url, response));
            }
            log::debug!("Probe {url} answered {}", response.status);
        }
        Err(ResolveError::NotFound(base))
    }

    /// Fetch the image for a candidate, using a known original URL when the
    /// source provided one and probing otherwise.
    pub fn resolve_candidate(
        &self,
        candidate: &Candidate,
    ) -> Result<(String, HttpResponse), ResolveError> {
        match candidate.original_url() {
            Some(url) => {
                let response = self.fetch(url)?;
                if response.is_success() {
                    Ok((url.to_string(), response))
                } else {
                    log::debug!("Original {url} answered {}", response.status);
                    Err(ResolveError::NotFound(url.to_string()))
                }
            }
            None => self.resolve_full_resolution(&candidate.thumbnail_url),
        }
    }

    fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.http.get(url, &[("Referer", self.referer.as_str())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockFetch;
    use crate::types::fixtures::candidate;

    const THUMB: &str = "https://tc-pximg01.techorus-cdn.com/c/240x480/img-master/img/2020/02/19/00/00/39/79583564_p0_master1200.jpg";
    const BASE: &str = "https://i.pximg.net/img-original/img/2020/02/19/00/00/39/79583564_p0";

    #[test]
    fn base_from_ranking_thumbnail() {
        assert_eq!(full_resolution_base(THUMB).unwrap(), BASE);
    }

    #[test]
    fn base_from_square_thumbnail() {
        let url = "https://i.pximg.net/c/250x250_80_a2/img-master/img/2021/01/01/10/20/30/123_p0_square1200.jpg";
        assert_eq!(
            full_resolution_base(url).unwrap(),
            "https://i.pximg.net/img-original/img/2021/01/01/10/20/30/123_p0_square1200"
        );
    }

    #[test]
    fn base_without_img_segment_is_rejected() {
        assert!(matches!(
            full_resolution_base("https://example.com/picture.jpg"),
            Err(ResolveError::InvalidThumbnailUrl(_))
        ));
    }

    #[test]
    fn png_found_after_jpg_miss_takes_two_probes() {
        let png_url = format!("{BASE}.png");
        let fetch = MockFetch::new().respond(&png_url, 200, vec![0x89, 0x50]);
        let resolver = ExtensionResolver::with_defaults(&fetch);

        let (url, response) = resolver.resolve_full_resolution(THUMB).unwrap();
        assert_eq!(url, png_url);
        assert_eq!(response.status, 200);
        assert_eq!(fetch.urls(), vec![format!("{BASE}.jpg"), png_url]);
    }

    #[test]
    fn first_hit_stops_probing() {
        let jpg_url = format!("{BASE}.jpg");
        let fetch = MockFetch::new()
            .respond(&jpg_url, 200, vec![0xFF, 0xD8])
            .respond(&format!("{BASE}.png"), 200, vec![0x89, 0x50]);
        let resolver = ExtensionResolver::with_defaults(&fetch);

        resolver.resolve_full_resolution(THUMB).unwrap();
        assert_eq!(fetch.urls(), vec![jpg_url]);
    }

    #[test]
    fn every_probe_sends_referer() {
        let fetch = MockFetch::new();
        let resolver = ExtensionResolver::new(
            &fetch,
            vec![".png".into(), ".jpg".into(), ".gif".into()],
            "https://custom/",
        );

        assert!(matches!(
            resolver.resolve_full_resolution(THUMB),
            Err(ResolveError::NotFound(_))
        ));
        let requests = fetch.get_requests();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.header("Referer") == Some("https://custom/")));
    }

    #[test]
    fn transport_failure_stops_the_sequence() {
        let fetch = MockFetch::new().fail(&format!("{BASE}.jpg"));
        let resolver = ExtensionResolver::with_defaults(&fetch);

        assert!(matches!(
            resolver.resolve_full_resolution(THUMB),
            Err(ResolveError::Transport(_))
        ));
        assert_eq!(fetch.urls().len(), 1);
    }

    #[test]
    fn known_original_url_is_fetched_directly() {
        let mut c = candidate(7);
        c.image_urls = vec!["https://i.pximg.net/img-original/img/x/7_p0.png".into()];
        let fetch = MockFetch::new().respond(&c.image_urls[0], 200, vec![0x89, 0x50]);
        let resolver = ExtensionResolver::with_defaults(&fetch);

        let (url, _) = resolver.resolve_candidate(&c).unwrap();
        assert_eq!(url, c.image_urls[0]);
        assert_eq!(fetch.urls().len(), 1);
        assert_eq!(
            fetch.get_requests()[0].header("Referer"),
            Some(DEFAULT_REFERER)
        );
    }

    #[test]
    fn known_original_url_missing_is_not_found() {
        let mut c = candidate(7);
        c.image_urls = vec!["https://i.pximg.net/img-original/img/x/7_p0.png".into()];
        let fetch = MockFetch::new();
        let resolver = ExtensionResolver::with_defaults(&fetch);

        assert!(matches!(
            resolver.resolve_candidate(&c),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn candidate_without_original_is_probed() {
        let c = candidate(79583564);
        let fetch = MockFetch::new();
        let resolver = ExtensionResolver::with_defaults(&fetch);

        let _ = resolver.resolve_candidate(&c);
        assert_eq!(
            fetch.urls(),
            vec![
                "https://i.pximg.net/img-original/img/2020/02/19/00/00/39/79583564_p0.jpg",
                "https://i.pximg.net/img-original/img/2020/02/19/00/00/39/79583564_p0.png",
            ]
        );
    }
}
