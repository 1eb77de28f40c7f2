//! Retry-chain exemption tracking
//!
//! When a duplicate-exempt request fails and is retried, its exemption must
//! not outlive one derivation hop. The tracker holds the identities of such
//! requests so the redirect resolver can consult them instead of copying the
//! exemption flag blindly. Entries are inserted and removed at explicit
//! state-machine transitions and never survive chain resolution.

use crate::request::RequestId;
use std::collections::HashSet;
use std::sync::Mutex;

/// Identities of in-flight requests whose duplicate exemption is suspect
#[derive(Debug, Default)]
pub struct ChainTracker {
    marked: Mutex<HashSet<RequestId>>,
}

impl ChainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a request: a duplicate-exempt request is about to be retried
    pub fn mark(&self, id: RequestId) {
        self.marked.lock().unwrap().insert(id);
    }

    /// Removes a mark, reporting whether it was present
    pub fn unmark(&self, id: RequestId) -> bool {
        self.marked.lock().unwrap().remove(&id)
    }

    /// Moves a mark from a parent request to its retry derivative
    ///
    /// Single critical section, so no observer ever sees both or neither
    /// while the transfer is in progress.
    pub fn transfer(&self, from: RequestId, to: RequestId) {
        let mut marked = self.marked.lock().unwrap();
        if marked.remove(&from) {
            marked.insert(to);
        }
    }

    /// Drops every mark; used on shutdown so cancelled chains leave nothing
    pub fn clear(&self) {
        self.marked.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.marked.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.lock().unwrap().is_empty()
    }
}
