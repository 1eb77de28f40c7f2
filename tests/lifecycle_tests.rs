//! End-to-end lifecycle tests against a scripted fetcher
//!
//! These drive the full engine — frontier, worker pool, coordinator, filter,
//! chain tracker — with per-path outcome scripts, so retry/redirect/dedup
//! interactions are exercised exactly as they occur in a run.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use url::Url;
use weir::config::Settings;
use weir::fetch::{Fetcher, Outcome, Response};
use weir::lifecycle::{ChainError, Engine, Sink};
use weir::request::Request;
use weir::stats::keys;
use weir::ExceptionKind;

/// Serves scripted outcomes per URL path, recording every hit
///
/// Outcomes are consumed front to back; the last one repeats. A path with no
/// script is a connection-refused exception.
#[derive(Default)]
struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    hits: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn script(self, path: &str, outcomes: Vec<Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), outcomes.into());
        self
    }

    fn hits_for(&self, path: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    fn hit_order(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Outcome {
        let path = request.url.path().to_string();
        self.hits.lock().unwrap().push(path.clone());

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Outcome::Exception(ExceptionKind::ConnectionRefused),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    pages: Mutex<Vec<(String, u16)>>,
    failures: Mutex<Vec<String>>,
}

impl Sink for RecordingSink {
    fn on_page(&self, request: &Request, response: &Response) {
        self.pages
            .lock()
            .unwrap()
            .push((request.url.to_string(), response.status));
    }

    fn on_failure(&self, _request: &Request, error: &ChainError) {
        self.failures.lock().unwrap().push(error.to_string());
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.retry.max_times = 1;
    settings.retry.http_codes = [503].into_iter().collect();
    settings
}

fn ok() -> Outcome {
    Outcome::Response(Response::new(200).with_body(b"page"))
}

fn status(code: u16) -> Outcome {
    Outcome::Response(Response::new(code))
}

fn redirect(status: u16, location: &str) -> Outcome {
    Outcome::Response(Response::new(status).with_header("Location", location))
}

fn request(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
}

fn engine_with(
    settings: Settings,
    fetcher: ScriptedFetcher,
) -> (Arc<Engine>, Arc<ScriptedFetcher>, Arc<RecordingSink>) {
    let fetcher = Arc::new(fetcher);
    let sink = Arc::new(RecordingSink::default());
    let engine = Arc::new(Engine::new(
        &settings,
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        Arc::clone(&sink) as Arc<dyn Sink>,
    ));
    (engine, fetcher, sink)
}

#[tokio::test]
async fn test_retry_then_success_delivers_once() {
    let fetcher =
        ScriptedFetcher::default().script("/flaky", vec![status(503), ok()]);
    let (engine, fetcher, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/flaky"));
    engine.run().await;

    assert_eq!(
        *sink.pages.lock().unwrap(),
        &[("http://test.local/flaky".to_string(), 200)]
    );
    assert_eq!(fetcher.hits_for("/flaky"), 2);
    assert_eq!(engine.stats().get(keys::RETRY_COUNT), 1);
    assert_eq!(engine.stats().get("retry/reason_count/503"), 1);
}

#[tokio::test]
async fn test_retries_exhausted_counts_once() {
    let fetcher = ScriptedFetcher::default().script("/down", vec![status(503)]);
    let (engine, fetcher, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/down"));
    engine.run().await;

    // max-times = 1: two fetches total, then the chain ends
    assert_eq!(fetcher.hits_for("/down"), 2);
    assert!(sink.pages.lock().unwrap().is_empty());
    assert_eq!(sink.failures.lock().unwrap().len(), 1);
    assert_eq!(engine.stats().get(keys::RETRY_COUNT), 1);
    assert_eq!(engine.stats().get(keys::RETRY_MAX_REACHED), 1);
}

#[tokio::test]
async fn test_retryable_exception_then_success() {
    let fetcher = ScriptedFetcher::default().script(
        "/wobbly",
        vec![Outcome::Exception(ExceptionKind::Timeout), ok()],
    );
    let (engine, _, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/wobbly"));
    engine.run().await;

    assert_eq!(sink.pages.lock().unwrap().len(), 1);
    assert_eq!(engine.stats().get("retry/reason_count/timeout"), 1);
}

#[tokio::test]
async fn test_non_retryable_exception_fails_chain() {
    let fetcher = ScriptedFetcher::default();
    let (engine, _, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/nowhere"));
    engine.run().await;

    assert!(sink.pages.lock().unwrap().is_empty());
    assert_eq!(sink.failures.lock().unwrap().len(), 1);
    assert_eq!(engine.stats().get(keys::RETRY_COUNT), 0);
}

#[tokio::test]
async fn test_redirect_chain_followed() {
    let fetcher = ScriptedFetcher::default()
        .script("/start", vec![redirect(302, "/middle")])
        .script("/middle", vec![redirect(302, "/end")])
        .script("/end", vec![ok()]);
    let (engine, _, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/start"));
    engine.run().await;

    assert_eq!(
        *sink.pages.lock().unwrap(),
        &[("http://test.local/end".to_string(), 200)]
    );
    assert_eq!(engine.stats().get(keys::REDIRECT_COUNT), 2);
}

#[tokio::test]
async fn test_redirect_to_already_admitted_target_is_filtered() {
    let fetcher = ScriptedFetcher::default()
        .script("/page", vec![ok()])
        .script("/alias", vec![redirect(301, "/page")]);
    let (engine, fetcher, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/page"));
    engine.submit(request("http://test.local/alias"));
    engine.run().await;

    assert_eq!(fetcher.hits_for("/page"), 1);
    assert_eq!(sink.pages.lock().unwrap().len(), 1);
    assert_eq!(engine.stats().get(keys::DUPEFILTER_FILTERED), 1);
}

/// The scenario this crate exists for: a duplicate-exempt seed redirects to
/// a page that 503s; the retry of that page redirects to a URL that was
/// already crawled. The final hop must be filterable — and filtered.
#[tokio::test]
async fn test_redirect_after_retry_is_filtered() {
    let fetcher = ScriptedFetcher::default()
        .script("/sbn", vec![ok()])
        .script("/sbn/", vec![redirect(307, "/first_fail")])
        .script("/first_fail", vec![status(503), redirect(307, "/sbn")]);
    let (engine, fetcher, sink) = engine_with(test_settings(), fetcher);

    // "/sbn" is crawled normally first
    assert!(engine.submit(request("http://test.local/sbn")));
    // The seed enters with the duplicate-filter bypass
    assert!(engine.submit(request("http://test.local/sbn/").with_allow_duplicate(true)));
    engine.run().await;

    // The final redirect back to /sbn was dropped by the filter: the page
    // was processed exactly once
    assert_eq!(fetcher.hits_for("/sbn"), 1);
    assert_eq!(
        *sink.pages.lock().unwrap(),
        &[("http://test.local/sbn".to_string(), 200)]
    );
    assert_eq!(engine.stats().get(keys::RETRY_COUNT), 1);
    assert_eq!(engine.stats().get(keys::DUPEFILTER_FILTERED), 1);

    // No chain-tracking state survives the run
    assert!(engine.coordinator().chain_tracker().is_empty());
}

/// Contrast case: without a retry in between, a redirect from an exempt
/// request keeps the exemption, and the target bypasses the filter.
#[tokio::test]
async fn test_redirect_without_retry_keeps_exemption() {
    let fetcher = ScriptedFetcher::default()
        .script("/sbn", vec![ok()])
        .script("/sbn/", vec![redirect(307, "/sbn")]);
    let (engine, fetcher, sink) = engine_with(test_settings(), fetcher);

    assert!(engine.submit(request("http://test.local/sbn")));
    assert!(engine.submit(request("http://test.local/sbn/").with_allow_duplicate(true)));
    engine.run().await;

    // The exempt chain's redirect target bypassed the filter
    assert_eq!(fetcher.hits_for("/sbn"), 2);
    assert_eq!(sink.pages.lock().unwrap().len(), 2);
    assert_eq!(engine.stats().get(keys::DUPEFILTER_FILTERED), 0);
}

#[tokio::test]
async fn test_higher_priority_dispatched_first() {
    let mut settings = test_settings();
    settings.dispatch.max_workers = 1;

    let fetcher = ScriptedFetcher::default()
        .script("/low", vec![ok()])
        .script("/high", vec![ok()]);
    let (engine, fetcher, _) = engine_with(settings, fetcher);

    engine.submit(request("http://test.local/low").with_priority(0));
    engine.submit(request("http://test.local/high").with_priority(10));
    engine.run().await;

    assert_eq!(fetcher.hit_order(), vec!["/high", "/low"]);
}

#[tokio::test]
async fn test_failing_chain_does_not_disturb_others() {
    let fetcher = ScriptedFetcher::default()
        .script("/good", vec![ok()])
        .script("/bad", vec![status(503)]);
    let (engine, _, sink) = engine_with(test_settings(), fetcher);

    engine.submit(request("http://test.local/good"));
    engine.submit(request("http://test.local/bad"));
    engine.run().await;

    assert_eq!(sink.pages.lock().unwrap().len(), 1);
    assert_eq!(sink.failures.lock().unwrap().len(), 1);
}
