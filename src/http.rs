//! Blocking HTTP access behind a small trait.
//!
//! Everything that talks to the network (catalog feeds, extension probes,
//! image downloads) goes through [`HttpFetch`], so tests can script
//! responses with [`tests::MockFetch`] instead of reaching the real hosts.
//!
//! A non-2xx status is *not* an error at this layer: callers decide whether
//! a 404 means "wrong guess" or "failure". Only transport-level problems
//! (DNS, connect, TLS, timeouts) surface as [`TransportError`].
//!
//! With network bypass on, host names are looked up through Cloudflare's
//! DNS-over-HTTPS endpoint ([`DohResolver`]) instead of the system resolver,
//! for networks whose DNS blocks or poisons pixiv.

use serde::Deserialize;
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// DNS-over-HTTPS endpoint, addressed by IP so it needs no lookup itself.
pub const DOH_URL: &str = "https://1.0.0.1/dns-query";
const DOH_CONTENT_TYPE: &str = "application/dns-json";
/// DNS record type `A`.
const RECORD_A: u16 = 1;

/// Connection or protocol failure. Always worth retrying later.
#[derive(Error, Debug)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Status line and streaming body of a completed request.
pub struct HttpResponse {
    pub status: u16,
    /// Value of `Content-Length` when the server sent one.
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body into a string.
    pub fn into_string(mut self, url: &str) -> Result<String, TransportError> {
        let mut text = String::new();
        self.body
            .read_to_string(&mut text)
            .map_err(|e| TransportError {
                url: url.to_string(),
                message: format!("failed to read response: {e}"),
            })?;
        Ok(text)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Capability to issue GET requests.
pub trait HttpFetch {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpFetch + ?Sized> HttpFetch for &T {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        (**self).get(url, headers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(60),
        }
    }
}

/// Production fetcher backed by a shared `ureq` agent.
pub struct UreqFetch {
    agent: ureq::Agent,
}

impl UreqFetch {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            agent: Self::builder(timeouts).build(),
        }
    }

    /// Like [`UreqFetch::new`], but resolving host names over DNS-over-HTTPS.
    pub fn with_network_bypass(timeouts: Timeouts) -> Self {
        let resolver = DohResolver::new(UreqFetch::new(timeouts));
        Self {
            agent: Self::builder(timeouts).resolver(resolver).build(),
        }
    }

    fn builder(timeouts: Timeouts) -> ureq::AgentBuilder {
        ureq::AgentBuilder::new()
            .timeout_connect(timeouts.connect)
            .timeout_read(timeouts.read)
            .user_agent(concat!("pixiv-fetch/", env!("CARGO_PKG_VERSION")))
    }

    fn into_response(response: ureq::Response) -> HttpResponse {
        let status = response.status();
        let content_length = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse().ok());
        HttpResponse {
            status,
            content_length,
            body: Box::new(response.into_reader()),
        }
    }
}

impl HttpFetch for UreqFetch {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }
        match request.call() {
            Ok(response) => Ok(Self::into_response(response)),
            Err(ureq::Error::Status(_, response)) => Ok(Self::into_response(response)),
            Err(ureq::Error::Transport(transport)) => Err(TransportError {
                url: url.to_string(),
                message: transport.to_string(),
            }),
        }
    }
}

// =============================================================================
// DNS-over-HTTPS
// =============================================================================

#[derive(Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohRecord>,
}

#[derive(Deserialize)]
struct DohRecord {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// Addresses from the `A` records of a DNS JSON answer. CNAME and other
/// records are ignored.
pub fn parse_doh_answer(body: &str) -> Result<Vec<IpAddr>, serde_json::Error> {
    let response: DohResponse = serde_json::from_str(body)?;
    Ok(response
        .answer
        .into_iter()
        .filter(|r| r.record_type == RECORD_A)
        .filter_map(|r| r.data.parse().ok())
        .collect())
}

pub fn doh_query_url(host: &str) -> String {
    format!(
        "{DOH_URL}?name={}&ct={DOH_CONTENT_TYPE}&type=A",
        urlencoding::encode(host)
    )
}

/// Host lookups over DNS-over-HTTPS, usable as a `ureq` resolver.
pub struct DohResolver<H> {
    http: H,
}

impl<H: HttpFetch> DohResolver<H> {
    /// `http` carries the queries; it must not itself resolve through this.
    pub fn new(http: H) -> Self {
        Self { http }
    }

    pub fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, TransportError> {
        let url = doh_query_url(host);
        let response = self.http.get(&url, &[("Accept", DOH_CONTENT_TYPE)])?;
        if !response.is_success() {
            return Err(TransportError {
                message: format!("DNS query answered HTTP {}", response.status),
                url,
            });
        }
        let body = response.into_string(&url)?;
        let ips = parse_doh_answer(&body).map_err(|e| TransportError {
            url: url.clone(),
            message: format!("invalid DNS answer: {e}"),
        })?;
        log::debug!("Resolved {host} to {ips:?}");
        Ok(ips)
    }
}

impl<H: HttpFetch + Send + Sync> ureq::Resolver for DohResolver<H> {
    fn resolve(&self, netloc: &str) -> io::Result<Vec<SocketAddr>> {
        let (host, port) = netloc.rsplit_once(':').ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("no port in {netloc}"))
        })?;
        let port: u16 = port.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("bad port in {netloc}"))
        })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }
        let ips = self.lookup(host).map_err(io::Error::other)?;
        if ips.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no A record for {host}"),
            ));
        }
        Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect())
    }
}
