//! reqwest-backed fetcher
//!
//! Redirects are not followed here: the client is built with
//! `Policy::none()` so every 3xx surfaces as a plain response and the
//! lifecycle core decides whether and how to follow it.

use super::{ExceptionKind, Fetcher, Outcome, Response};
use crate::config::Settings;
use crate::request::Request;
use crate::WeirError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Default fetcher implementation over a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the fetcher from run settings
    pub fn new(settings: &Settings) -> Result<Self, WeirError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.header_value())
            .timeout(Duration::from_secs(settings.dispatch.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::none())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Maps a reqwest error onto the closed exception taxonomy
    fn classify_error(error: &reqwest::Error) -> ExceptionKind {
        if error.is_timeout() {
            return ExceptionKind::Timeout;
        }

        let message = error.to_string().to_lowercase();

        if message.contains("dns") || message.contains("name resolution") {
            ExceptionKind::DnsFailure
        } else if message.contains("connection refused") {
            ExceptionKind::ConnectionRefused
        } else if message.contains("connection reset") {
            ExceptionKind::ConnectionReset
        } else if message.contains("broken pipe")
            || message.contains("connection closed")
            || message.contains("incomplete message")
        {
            ExceptionKind::ConnectionLost
        } else if message.contains("ssl")
            || message.contains("tls")
            || message.contains("certificate")
        {
            ExceptionKind::Ssl
        } else if error.is_connect() {
            ExceptionKind::ConnectionRefused
        } else {
            ExceptionKind::Other
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Outcome {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                let kind = Self::classify_error(&e);
                tracing::debug!("Fetch of {} failed: {} ({})", request.url, e, kind);
                return Outcome::Exception(kind);
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                tracing::debug!("Body read for {} failed: {}", request.url, e);
                return Outcome::Exception(ExceptionKind::BodyRead);
            }
        };

        Outcome::Response(Response {
            status,
            headers,
            body,
        })
    }
}
