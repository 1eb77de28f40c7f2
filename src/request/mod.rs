//! Request data model
//!
//! A [`Request`] is one fetch intent. It is immutable by convention once it
//! has been submitted for dispatch: every change (retry bookkeeping, redirect
//! target, priority bump) produces a new value via [`Request::derived`],
//! never a mutation of one already in flight.

mod fingerprint;

pub use fingerprint::{canonical_url, Fingerprint};

use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Well-known meta keys carried across retry/redirect derivations
pub mod meta_keys {
    /// Number of retries already performed on this chain (absent means 0)
    pub const RETRY_TIMES: &str = "retry_times";

    /// Per-request override of the global retry maximum
    pub const MAX_RETRY_TIMES: &str = "max_retry_times";

    /// Explicit opt-out: never retry this request
    pub const DONT_RETRY: &str = "dont_retry";

    /// Number of redirect hops already followed on this chain
    pub const REDIRECT_TIMES: &str = "redirect_times";

    /// URLs visited along the redirect chain, oldest first
    pub const REDIRECT_URLS: &str = "redirect_urls";
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Stable request identity, assigned once at creation
///
/// Identities are process-unique monotonic sequence numbers. The chain
/// tracker is keyed by them, so exemption state never depends on object
/// addresses or fingerprint collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One fetch intent
#[derive(Debug, Clone)]
pub struct Request {
    /// Stable identity; fresh on every derivation
    pub id: RequestId,

    /// Normalized absolute URI
    pub url: Url,

    /// HTTP verb
    pub method: Method,

    /// Outgoing headers, insertion order preserved
    pub headers: Vec<(String, String)>,

    /// Request body; participates in fingerprinting
    pub body: Vec<u8>,

    /// Cross-retry/redirect state, copied by value on derivation
    pub meta: HashMap<String, Value>,

    /// When true, this specific request bypasses the duplicate filter
    pub allow_duplicate: bool,

    /// Scheduling hint, higher dispatched sooner
    pub priority: i32,
}

impl Request {
    /// Creates a new request with a fresh identity
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::next(),
            url,
            method,
            headers: Vec::new(),
            body: Vec::new(),
            meta: HashMap::new(),
            allow_duplicate: false,
            priority: 0,
        }
    }

    /// Creates a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Sets the duplicate-filter bypass flag
    pub fn with_allow_duplicate(mut self, allow: bool) -> Self {
        self.allow_duplicate = allow;
        self
    }

    /// Sets the scheduling priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Appends a header, preserving insertion order
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Sets a meta value
    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.meta.insert(key.to_string(), value);
        self
    }

    /// Copies this request into a new value with a fresh identity
    ///
    /// Everything except the id is carried over; the meta map is cloned, so
    /// parent and child never alias state. Deriving operations state what
    /// they change on the copy explicitly.
    pub fn derived(&self) -> Request {
        Request {
            id: RequestId::next(),
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            meta: self.meta.clone(),
            allow_duplicate: self.allow_duplicate,
            priority: self.priority,
        }
    }

    /// Case-insensitive header lookup, first match wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces a header in place, or appends it if absent
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Number of retries already performed on this chain
    pub fn retry_times(&self) -> u32 {
        self.meta
            .get(meta_keys::RETRY_TIMES)
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    /// Per-request override of the global retry maximum, if any
    pub fn max_retry_times(&self) -> Option<u32> {
        self.meta
            .get(meta_keys::MAX_RETRY_TIMES)
            .and_then(Value::as_u64)
            .map(|v| v as u32)
    }

    /// Whether this request opted out of retries entirely
    pub fn dont_retry(&self) -> bool {
        self.meta
            .get(meta_keys::DONT_RETRY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Number of redirect hops already followed on this chain
    pub fn redirect_times(&self) -> u32 {
        self.meta
            .get(meta_keys::REDIRECT_TIMES)
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{} {} {}>", self.id, self.method, self.url)
    }
}
