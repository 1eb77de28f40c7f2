//! Retry decisions
//!
//! The policy is a pure function over a request and the reason its fetch
//! failed. It owns no state and touches no counters; the coordinator acts on
//! the returned decision.

use crate::config::RetrySettings;
use crate::fetch::ExceptionKind;
use crate::request::{meta_keys, Request};
use serde_json::json;

/// Why a fetch is being considered for retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// The server answered with a status in the configured retryable set
    Status(u16),

    /// The transport failed with a configured retryable kind
    Exception(ExceptionKind),
}

impl std::fmt::Display for RetryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryReason::Status(code) => write!(f, "{}", code),
            RetryReason::Exception(kind) => write!(f, "{}", kind),
        }
    }
}

/// Outcome of a retry decision
#[derive(Debug)]
pub enum RetryDecision {
    /// Dispatch this derived request
    Retry(Request),

    /// The retry budget is exhausted; the chain ends
    GiveUp {
        /// Retries already performed when the budget ran out
        attempts: u32,
    },

    /// The reason is not retryable at all
    NoRetry,
}

/// Pure retry decision function
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    settings: RetrySettings,
}

impl RetryPolicy {
    pub fn new(settings: RetrySettings) -> Self {
        Self { settings }
    }

    /// Whether the reason falls in the configured retryable sets
    pub fn is_retryable(&self, reason: &RetryReason) -> bool {
        match reason {
            RetryReason::Status(code) => self.settings.http_codes.contains(code),
            RetryReason::Exception(kind) => self.settings.exception_kinds.contains(kind),
        }
    }

    /// Decides whether to retry a failed request
    ///
    /// The derived request carries the same url/method/headers/body (the
    /// Referer travels with the cloned headers), an incremented
    /// `retry_times`, the configured priority adjustment, and
    /// `allow_duplicate` forced to `false`: a retry must always re-enter the
    /// duplicate filter as an ordinary candidate, whatever its parent was.
    pub fn decide(&self, request: &Request, reason: &RetryReason) -> RetryDecision {
        if !self.is_retryable(reason) {
            return RetryDecision::NoRetry;
        }

        let retries = request.retry_times() + 1;
        let max = request.max_retry_times().unwrap_or(self.settings.max_times);

        if retries > max {
            return RetryDecision::GiveUp {
                attempts: request.retry_times(),
            };
        }

        let mut derived = request.derived();
        derived
            .meta
            .insert(meta_keys::RETRY_TIMES.to_string(), json!(retries));
        derived.priority = request.priority + self.settings.priority_adjust;
        derived.allow_duplicate = false;

        RetryDecision::Retry(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetrySettings {
            max_times: 2,
            http_codes: [503].into_iter().collect(),
            exception_kinds: [ExceptionKind::Timeout].into_iter().collect(),
            priority_adjust: -1,
        })
    }

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_unretryable_status_yields_no_retry() {
        let decision = policy().decide(&request("https://example.com/"), &RetryReason::Status(404));
        assert!(matches!(decision, RetryDecision::NoRetry));
    }

    #[test]
    fn test_unretryable_exception_yields_no_retry() {
        let decision = policy().decide(
            &request("https://example.com/"),
            &RetryReason::Exception(ExceptionKind::Ssl),
        );
        assert!(matches!(decision, RetryDecision::NoRetry));
    }

    #[test]
    fn test_retry_increments_attempt_count_by_one() {
        let req = request("https://example.com/");
        match policy().decide(&req, &RetryReason::Status(503)) {
            RetryDecision::Retry(derived) => {
                assert_eq!(derived.retry_times(), 1);
                assert_ne!(derived.id, req.id);
                assert_eq!(derived.url, req.url);
            }
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_forces_filterable() {
        let req = request("https://example.com/").with_allow_duplicate(true);
        match policy().decide(&req, &RetryReason::Status(503)) {
            RetryDecision::Retry(derived) => assert!(!derived.allow_duplicate),
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_applies_priority_adjust() {
        let req = request("https://example.com/").with_priority(10);
        match policy().decide(&req, &RetryReason::Exception(ExceptionKind::Timeout)) {
            RetryDecision::Retry(derived) => assert_eq!(derived.priority, 9),
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_gives_up_past_the_maximum() {
        let req = request("https://example.com/").with_meta(meta_keys::RETRY_TIMES, json!(2));
        match policy().decide(&req, &RetryReason::Status(503)) {
            RetryDecision::GiveUp { attempts } => assert_eq!(attempts, 2),
            other => panic!("expected give-up, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_override_extends_budget() {
        let req = request("https://example.com/")
            .with_meta(meta_keys::RETRY_TIMES, json!(2))
            .with_meta(meta_keys::MAX_RETRY_TIMES, json!(5));
        match policy().decide(&req, &RetryReason::Status(503)) {
            RetryDecision::Retry(derived) => assert_eq!(derived.retry_times(), 3),
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_override_shrinks_budget() {
        let req = request("https://example.com/")
            .with_meta(meta_keys::MAX_RETRY_TIMES, json!(0));
        let decision = policy().decide(&req, &RetryReason::Status(503));
        assert!(matches!(decision, RetryDecision::GiveUp { attempts: 0 }));
    }

    #[test]
    fn test_referer_travels_with_headers() {
        let req = request("https://example.com/page")
            .with_header("Referer", "https://example.com/");
        match policy().decide(&req, &RetryReason::Status(503)) {
            RetryDecision::Retry(derived) => {
                assert_eq!(derived.header("Referer"), Some("https://example.com/"));
            }
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_reason_display_used_for_stat_keys() {
        assert_eq!(RetryReason::Status(503).to_string(), "503");
        assert_eq!(
            RetryReason::Exception(ExceptionKind::Timeout).to_string(),
            "timeout"
        );
    }
}
