//! Dispatch engine
//!
//! A bounded worker pool drives request chains to resolution: pop the
//! highest-priority pending request, fetch it, feed the outcome to the
//! coordinator, and resubmit whatever it derives. Fetch I/O is the only
//! suspension point; filter and tracker mutations are short critical
//! sections and no lock is ever held across an await.

use crate::config::Settings;
use crate::fetch::{Fetcher, Outcome};
use crate::lifecycle::coordinator::{Coordinator, Disposition};
use crate::lifecycle::Sink;
use crate::request::Request;
use crate::stats::{keys, StatsCollector};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Frontier entry; higher priority first, FIFO within a priority level
#[derive(Debug)]
struct PendingRequest(Request);

impl Ord for PendingRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.id.cmp(&self.0.id))
    }
}

impl PartialOrd for PendingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingRequest {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.id == other.0.id
    }
}

impl Eq for PendingRequest {}

/// Signals a running engine to stop between hops
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn signal(&self) {
        let _ = self.tx.send(true);
    }
}

/// Worker pool driving request chains through the coordinator
pub struct Engine {
    coordinator: Arc<Coordinator>,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn Sink>,
    stats: Arc<StatsCollector>,
    frontier: Mutex<BinaryHeap<PendingRequest>>,
    max_workers: usize,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn Sink>) -> Self {
        let stats = Arc::new(StatsCollector::new());
        let coordinator = Arc::new(Coordinator::new(settings, Arc::clone(&stats)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            coordinator,
            fetcher,
            sink,
            stats,
            frontier: Mutex::new(BinaryHeap::new()),
            max_workers: settings.dispatch.max_workers as usize,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Submits a request through the duplicate filter gate
    ///
    /// Returns whether the request was admitted to the frontier.
    pub fn submit(&self, request: Request) -> bool {
        if !self.coordinator.admit(&request) {
            return false;
        }

        self.frontier.lock().unwrap().push(PendingRequest(request));
        true
    }

    /// A handle that stops the run between any two hops
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn stats(&self) -> Arc<StatsCollector> {
        Arc::clone(&self.stats)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    fn next_request(&self) -> Option<Request> {
        self.frontier.lock().unwrap().pop().map(|pending| pending.0)
    }

    /// Runs until the frontier drains and all chains resolve, or shutdown
    ///
    /// Cancelled runs abort in-flight fetches and leave no stale
    /// chain-tracking state behind.
    pub async fn run(&self) {
        let mut in_flight: JoinSet<(Request, Outcome)> = JoinSet::new();
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            // Fill the pool
            while in_flight.len() < self.max_workers {
                match self.next_request() {
                    Some(request) => {
                        let fetcher = Arc::clone(&self.fetcher);
                        in_flight.spawn(async move {
                            let outcome = fetcher.fetch(&request).await;
                            (request, outcome)
                        });
                    }
                    None => break,
                }
            }

            // Frontier empty and nothing in flight: the run is complete
            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                joined = in_flight.join_next() => {
                    let Some(Ok((request, outcome))) = joined else {
                        continue;
                    };
                    self.resolve(&request, outcome);
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        in_flight.shutdown().await;
        // A cancelled chain is cleaned up the same as a terminal one
        self.coordinator.clear_chain_state();
    }

    fn resolve(&self, request: &Request, outcome: Outcome) {
        match self.coordinator.handle_outcome(request, outcome) {
            Disposition::Resubmit(derived) => {
                self.submit(derived);
            }
            Disposition::Deliver(response) => {
                self.stats.increment(keys::PAGES_DELIVERED);
                self.sink.on_page(request, &response);
            }
            Disposition::Drop(error) => {
                self.stats.increment(keys::CHAINS_FAILED);
                self.sink.on_failure(request, &error);
            }
        }
    }
}
