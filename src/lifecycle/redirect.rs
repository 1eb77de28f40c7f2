//! Redirect resolution
//!
//! Produces the derived request for a 3xx response. The resolver is
//! stateless; whether the parent sat in the chain tracker is passed in by the
//! coordinator, because that decides the derived request's duplicate
//! exemption.

use crate::config::RedirectSettings;
use crate::fetch::Response;
use crate::request::{meta_keys, Request};
use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use url::Url;

/// Why a redirect could not be followed
#[derive(Debug, Error)]
pub enum RedirectError {
    #[error("redirect response carries no Location header")]
    MissingLocation,

    #[error("cannot resolve redirect target '{0}'")]
    BadLocation(String),

    #[error("refusing to follow redirect to non-http(s) scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("exceeded the maximum of {0} redirects")]
    TooManyRedirects(u32),
}

/// Stateless redirect resolver
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    settings: RedirectSettings,
}

impl RedirectResolver {
    pub fn new(settings: RedirectSettings) -> Self {
        Self { settings }
    }

    /// Derives the request for a redirect target
    ///
    /// Method and body follow standard redirect semantics: 303 always
    /// downgrades to GET and drops the body, 301/302 do so for everything
    /// except GET and HEAD, 307/308 preserve both.
    ///
    /// `allow_duplicate` on the derived request copies the parent's flag,
    /// unless `parent_chain_marked` is set — meaning the parent was a
    /// just-retried, originally-exempt request — in which case the target is
    /// forced to be filterable.
    pub fn resolve(
        &self,
        request: &Request,
        response: &Response,
        parent_chain_marked: bool,
    ) -> Result<Request, RedirectError> {
        let location = response.location().ok_or(RedirectError::MissingLocation)?;

        let target: Url = request
            .url
            .join(location)
            .map_err(|_| RedirectError::BadLocation(location.to_string()))?;

        if !matches!(target.scheme(), "http" | "https") {
            return Err(RedirectError::UnsupportedScheme(target.scheme().to_string()));
        }

        let hops = request.redirect_times() + 1;
        if hops > self.settings.max_times {
            return Err(RedirectError::TooManyRedirects(self.settings.max_times));
        }

        let mut derived = request.derived();
        derived.url = target;
        derived.priority = request.priority + self.settings.priority_adjust;

        let downgrade = match response.status {
            303 => true,
            301 | 302 => request.method != Method::GET && request.method != Method::HEAD,
            _ => false, // 307 and 308 preserve method and body
        };
        if downgrade {
            derived.method = Method::GET;
            derived.body.clear();
            derived
                .headers
                .retain(|(k, _)| !k.eq_ignore_ascii_case("content-type")
                    && !k.eq_ignore_ascii_case("content-length"));
        }

        derived
            .meta
            .insert(meta_keys::REDIRECT_TIMES.to_string(), json!(hops));
        let mut visited = request
            .meta
            .get(meta_keys::REDIRECT_URLS)
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        visited.push(json!(request.url.to_string()));
        derived
            .meta
            .insert(meta_keys::REDIRECT_URLS.to_string(), json!(visited));

        derived.allow_duplicate = if parent_chain_marked {
            false
        } else {
            request.allow_duplicate
        };

        Ok(derived)
    }
}
