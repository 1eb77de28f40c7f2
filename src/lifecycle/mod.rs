//! Request lifecycle coordination
//!
//! This module contains the decision core:
//! - retry policy: retry-or-give-up on failed fetches
//! - redirect resolver: derived requests for 3xx responses
//! - coordinator: the state machine tying retries, redirects, and the
//!   duplicate filter together
//! - engine: the worker pool that drives chains to resolution

mod coordinator;
mod engine;
mod redirect;
mod retry;

pub use coordinator::{ChainError, Coordinator, Disposition};
pub use engine::{Engine, ShutdownHandle};
pub use redirect::{RedirectError, RedirectResolver};
pub use retry::{RetryDecision, RetryPolicy, RetryReason};

use crate::fetch::Response;
use crate::request::Request;

/// Receiver of terminal chain outcomes
///
/// The coordinator hands off and never inspects the result of either call.
/// Implementations must not block; expensive work belongs on a channel.
pub trait Sink: Send + Sync {
    /// A chain resolved to a deliverable response
    fn on_page(&self, request: &Request, response: &Response);

    /// A chain ended without a deliverable response
    fn on_failure(&self, request: &Request, error: &ChainError);
}
