//! Duplicate request filtering
//!
//! The filter is the gate every request passes before dispatch. It is owned
//! by the coordinator and shared across dispatch workers; the check-then-
//! insert is a single critical section so two concurrent fetches of the same
//! target can never both be admitted.

mod chain;

pub use chain::ChainTracker;

use crate::config::FilterSettings;
use crate::request::{Fingerprint, Request};
use std::collections::HashSet;
use std::sync::Mutex;

/// Set of fingerprints already admitted to dispatch in this run
///
/// Bypass policy: a request with `allow_duplicate = true` is admitted without
/// recording its fingerprint. The exemption is local to that one request — a
/// later, unrelated request to the same URL is filtered (or admitted) exactly
/// as if the exempt request had never existed.
pub struct DuplicateFilter {
    seen: Mutex<HashSet<Fingerprint>>,
    enabled: bool,
    keep_fragments: bool,
}

impl DuplicateFilter {
    pub fn new(settings: &FilterSettings) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            enabled: settings.enabled,
            keep_fragments: settings.keep_fragments,
        }
    }

    /// Decides whether a request may be dispatched
    ///
    /// Returns `false` when the request's fingerprint was already admitted
    /// earlier in the run. Admission records the fingerprint atomically with
    /// the check.
    pub fn admit(&self, request: &Request) -> bool {
        if !self.enabled || request.allow_duplicate {
            return true;
        }

        let fingerprint = Fingerprint::of(request, self.keep_fragments);
        // Lock covers the read and the insert; held for O(1) work only
        self.seen.lock().unwrap().insert(fingerprint)
    }

    /// Number of fingerprints recorded so far
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
