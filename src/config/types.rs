use crate::fetch::ExceptionKind;
use serde::Deserialize;
use std::collections::HashSet;

/// Main settings structure for a crawl run
///
/// Every section has defaults, so an empty TOML file is a valid
/// configuration. Field names use kebab-case in the file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub redirect: RedirectSettings,

    #[serde(default)]
    pub filter: FilterSettings,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

/// Retry decision configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Maximum retries per request, unless overridden by request meta
    #[serde(rename = "max-times")]
    pub max_times: u32,

    /// HTTP status codes that are eligible for retry
    #[serde(rename = "http-codes")]
    pub http_codes: HashSet<u16>,

    /// Transport exception kinds that are eligible for retry
    #[serde(rename = "exception-kinds")]
    pub exception_kinds: HashSet<ExceptionKind>,

    /// Signed priority delta applied to each derived retry request
    #[serde(rename = "priority-adjust")]
    pub priority_adjust: i32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_times: 2,
            http_codes: [500, 502, 503, 504, 522, 524, 408, 429].into_iter().collect(),
            exception_kinds: [
                ExceptionKind::Timeout,
                ExceptionKind::DnsFailure,
                ExceptionKind::ConnectionRefused,
                ExceptionKind::ConnectionReset,
                ExceptionKind::ConnectionLost,
            ]
            .into_iter()
            .collect(),
            priority_adjust: -1,
        }
    }
}

/// Redirect following configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedirectSettings {
    /// Maximum redirect hops per chain
    #[serde(rename = "max-times")]
    pub max_times: u32,

    /// Signed priority delta applied to each redirect-target request
    #[serde(rename = "priority-adjust")]
    pub priority_adjust: i32,
}

impl Default for RedirectSettings {
    fn default() -> Self {
        Self {
            max_times: 20,
            priority_adjust: 2,
        }
    }
}

/// Duplicate filter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FilterSettings {
    /// When false, every request is admitted and nothing is recorded
    pub enabled: bool,

    /// Retain URL fragments when computing fingerprints
    #[serde(rename = "keep-fragments")]
    pub keep_fragments: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_fragments: false,
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Maximum number of concurrently in-flight fetches
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Per-fetch timeout in seconds, enforced by the fetcher
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_workers: 16,
            timeout_secs: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "weir".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.invalid/weir".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the outgoing User-Agent string
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }
}
