//! Request fingerprinting
//!
//! A fingerprint identifies a crawl target: two requests with equal
//! fingerprints are the same target regardless of ancestry. The function is
//! pure and deterministic over `(method, canonical-url, body)` and stable
//! across process restarts.
//!
//! Canonicalization rules, in full:
//! - query parameters are sorted by key; value order within a key is kept;
//! - the fragment is removed unless `keep_fragments` is set;
//! - default ports are elided (`:80` for http, `:443` for https);
//! - scheme and host are lowercased;
//! - the path is kept verbatim — `/page` and `/page/` are distinct targets,
//!   because many servers serve different resources for them.

use super::Request;
use sha2::{Digest, Sha256};
use url::Url;

/// Deterministic identity of a crawl target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request
    pub fn of(request: &Request, keep_fragments: bool) -> Self {
        let canonical = canonical_url(&request.url, keep_fragments);

        let mut hasher = Sha256::new();
        hasher.update(request.method.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        hasher.update([0u8]);
        hasher.update(&request.body);

        Fingerprint(hex::encode(hasher.finalize()))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short prefix is plenty for log lines
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Canonicalizes a URL for fingerprinting
///
/// Scheme/host lowercasing and default-port elision come from URL parsing
/// itself; this function adds query sorting and fragment handling. The
/// trailing slash is deliberately left alone.
pub fn canonical_url(url: &Url, keep_fragments: bool) -> String {
    let mut canonical = url.clone();

    if !keep_fragments {
        canonical.set_fragment(None);
    }

    if let Some(query) = canonical.query() {
        if query.is_empty() {
            canonical.set_query(None);
        } else {
            let mut pairs: Vec<(String, String)> = canonical
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            // Stable sort keeps value order within a repeated key
            pairs.sort_by(|a, b| a.0.cmp(&b.0));

            let sorted = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            canonical.set_query(Some(&sorted));
        }
    }

    canonical.to_string()
}
