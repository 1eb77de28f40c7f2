//! Fetch outcome model and the fetcher seam
//!
//! The lifecycle core never talks to a transport directly; it consumes
//! [`Outcome`] values produced by a [`Fetcher`]. A reqwest-backed
//! implementation lives in [`http`], tests substitute scripted ones.

mod http;

pub use http::HttpFetcher;

use crate::request::Request;
use async_trait::async_trait;
use serde::Deserialize;

/// HTTP-shaped response as seen by the lifecycle core
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Response headers, insertion order preserved
    pub headers: Vec<(String, String)>,

    /// Response body
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a response with the given status and no headers or body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the body
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Case-insensitive header lookup, first match wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The redirect target, if any
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    /// Whether this status is a followable redirect
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Body as text, lossy
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Transport failure, classified into a closed set of kinds
///
/// The retry settings hold a subset of these; anything outside the configured
/// subset is a terminal failure for the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionKind {
    Timeout,
    DnsFailure,
    ConnectionRefused,
    ConnectionReset,
    ConnectionLost,
    Ssl,
    BodyRead,
    Other,
}

impl std::fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExceptionKind::Timeout => "timeout",
            ExceptionKind::DnsFailure => "dns-failure",
            ExceptionKind::ConnectionRefused => "connection-refused",
            ExceptionKind::ConnectionReset => "connection-reset",
            ExceptionKind::ConnectionLost => "connection-lost",
            ExceptionKind::Ssl => "ssl",
            ExceptionKind::BodyRead => "body-read",
            ExceptionKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Result of one fetch attempt
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The server answered; any status code, including errors and redirects
    Response(Response),

    /// The transport failed before a response was produced
    Exception(ExceptionKind),
}

/// The transport seam
///
/// Fetching is the only suspension point in a chain; implementations may be
/// cancelled between hops. They must not retry internally — retry decisions
/// belong to the lifecycle core.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Outcome;
}
