//! The lifecycle state machine
//!
//! Every fetch outcome passes through [`Coordinator::handle_outcome`], which
//! decides between resubmission (retry or redirect), delivery, and dropping
//! the chain. The coordinator owns the duplicate filter and the chain
//! tracker; nothing else mutates either.
//!
//! Chain-tracking transitions, in full:
//! - a duplicate-exempt request receiving a retryable outcome is marked
//!   before the retry policy runs;
//! - when the policy produces a retry derivative, the mark moves to the
//!   derivative — exactly one hop of tracking, never more;
//! - a redirect consults and clears the parent's mark; a marked parent
//!   forces the redirect target to be filterable;
//! - every terminal transition (delivery, give-up, transport failure, or a
//!   duplicate-filter drop of the derivative) clears the mark;
//! - shutdown clears the set wholesale.

use crate::config::Settings;
use crate::fetch::{ExceptionKind, Outcome, Response};
use crate::filter::{ChainTracker, DuplicateFilter};
use crate::lifecycle::redirect::{RedirectError, RedirectResolver};
use crate::lifecycle::retry::{RetryDecision, RetryPolicy, RetryReason};
use crate::request::Request;
use crate::stats::{keys, StatsCollector};
use std::sync::Arc;
use thiserror::Error;

/// Terminal failure of a request chain
///
/// None of these are fatal to the crawl: a failed chain is reported and
/// ends, other in-flight chains are unaffected.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("gave up on {url} after {attempts} retries: {reason}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("transport failure for {url}: {kind}")]
    Exception { url: String, kind: ExceptionKind },

    #[error("redirect chain for {url} could not be followed: {source}")]
    RedirectFailed {
        url: String,
        source: RedirectError,
    },
}

/// What the engine should do with a chain after one outcome
#[derive(Debug)]
pub enum Disposition {
    /// Dispatch this derived request through the duplicate filter gate
    Resubmit(Request),

    /// The chain is done; hand the response to the sink
    Deliver(Response),

    /// The chain is done without a deliverable response
    Drop(ChainError),
}

/// Orchestrates retry, redirect, and duplicate filtering for every outcome
pub struct Coordinator {
    filter: DuplicateFilter,
    chain: ChainTracker,
    retry_policy: RetryPolicy,
    redirect_resolver: RedirectResolver,
    stats: Arc<StatsCollector>,
}

impl Coordinator {
    pub fn new(settings: &Settings, stats: Arc<StatsCollector>) -> Self {
        Self {
            filter: DuplicateFilter::new(&settings.filter),
            chain: ChainTracker::new(),
            retry_policy: RetryPolicy::new(settings.retry.clone()),
            redirect_resolver: RedirectResolver::new(settings.redirect.clone()),
            stats,
        }
    }

    /// The dispatch gate: every request, seed or derived, passes here once
    ///
    /// A filtered request is also scrubbed from the chain tracker — the
    /// filter decision point is one of the tracker's defined removal sites.
    pub fn admit(&self, request: &Request) -> bool {
        if self.filter.admit(request) {
            return true;
        }

        self.stats.increment(keys::DUPEFILTER_FILTERED);
        self.chain.unmark(request.id);
        tracing::debug!("Filtered duplicate request {}", request);
        false
    }

    /// Decides the fate of one fetch outcome
    pub fn handle_outcome(&self, request: &Request, outcome: Outcome) -> Disposition {
        match outcome {
            Outcome::Response(response) => self.handle_response(request, response),
            Outcome::Exception(kind) => self.handle_exception(request, kind),
        }
    }

    fn handle_response(&self, request: &Request, response: Response) -> Disposition {
        if !request.dont_retry() {
            let reason = RetryReason::Status(response.status);
            if let Some(disposition) = self.attempt_retry(request, reason) {
                return disposition;
            }
        }

        if response.is_redirect() {
            return self.follow_redirect(request, response);
        }

        // Terminal: delivered untouched, whatever the status
        self.chain.unmark(request.id);
        Disposition::Deliver(response)
    }

    fn handle_exception(&self, request: &Request, kind: ExceptionKind) -> Disposition {
        if !request.dont_retry() {
            let reason = RetryReason::Exception(kind);
            if let Some(disposition) = self.attempt_retry(request, reason) {
                return disposition;
            }
        }

        self.chain.unmark(request.id);
        Disposition::Drop(ChainError::Exception {
            url: request.url.to_string(),
            kind,
        })
    }

    /// Runs the retry policy for a retryable reason
    ///
    /// Returns `None` when the reason is not retryable at all, so the caller
    /// falls through to redirect/terminal handling.
    fn attempt_retry(&self, request: &Request, reason: RetryReason) -> Option<Disposition> {
        if !self.retry_policy.is_retryable(&reason) {
            return None;
        }

        // A duplicate-exempt request is about to be retried: mark it before
        // the policy runs
        if request.allow_duplicate {
            self.chain.mark(request.id);
        }

        match self.retry_policy.decide(request, &reason) {
            RetryDecision::Retry(derived) => {
                self.stats.increment(keys::RETRY_COUNT);
                self.stats
                    .increment(&keys::retry_reason(&reason.to_string()));
                self.chain.transfer(request.id, derived.id);
                tracing::debug!(
                    "Retrying {} (failed {} times): {}",
                    request,
                    derived.retry_times(),
                    reason
                );
                Some(Disposition::Resubmit(derived))
            }
            RetryDecision::GiveUp { attempts } => {
                self.stats.increment(keys::RETRY_MAX_REACHED);
                self.chain.unmark(request.id);
                tracing::error!(
                    "Gave up retrying {} (failed {} retries): {}",
                    request,
                    attempts,
                    reason
                );
                Some(Disposition::Drop(ChainError::RetriesExhausted {
                    url: request.url.to_string(),
                    attempts,
                    reason: reason.to_string(),
                }))
            }
            RetryDecision::NoRetry => {
                self.chain.unmark(request.id);
                None
            }
        }
    }

    fn follow_redirect(&self, request: &Request, response: Response) -> Disposition {
        // Consult and clear in one step: the mark never survives a redirect
        let parent_marked = self.chain.unmark(request.id);

        match self
            .redirect_resolver
            .resolve(request, &response, parent_marked)
        {
            Ok(target) => {
                self.stats.increment(keys::REDIRECT_COUNT);
                tracing::debug!("Redirecting {} to {}", request, target.url);
                Disposition::Resubmit(target)
            }
            Err(source @ RedirectError::TooManyRedirects(_)) => {
                tracing::warn!("Discarding {}: {}", request, source);
                Disposition::Drop(ChainError::RedirectFailed {
                    url: request.url.to_string(),
                    source,
                })
            }
            Err(error) => {
                // Malformed redirect: not a crash, the original response is
                // handed over untouched
                tracing::debug!(
                    "Redirect for {} not followable ({}); delivering response as-is",
                    request,
                    error
                );
                Disposition::Deliver(response)
            }
        }
    }

    /// Drops all chain-tracking state; called when a run is cancelled
    pub fn clear_chain_state(&self) {
        self.chain.clear();
    }

    /// The chain tracker, for inspection
    pub fn chain_tracker(&self) -> &ChainTracker {
        &self.chain
    }

    /// The duplicate filter, for inspection
    pub fn duplicate_filter(&self) -> &DuplicateFilter {
        &self.filter
    }
}
