//! Scripted transport for tests.
//!
//! # Design
//! `MockTransport` is a cheap-clone handle over one registry. A test keeps a
//! clone to script responses while the executor or job queue owns another.
//! Each test builds its own `MockTransport`, so parallel tests never see each
//! other's scripts, and `reset` clears everything for reuse.
//!
//! One mutex guards lookup, pop and request logging, so a consume-and-return
//! is atomic with respect to every other `send`. Simulated latency is slept
//! after the lock is released.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{MockMiss, TransportError};
use crate::http::{generate_response, HttpRequest, HttpResponse};
use crate::transport::Transport;

/// How registered responses are replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    /// Return the last registered response on every call.
    RepeatLast,
    /// Return responses in registration order, one per call, then fail.
    ConsumeOnePerCall,
}

#[derive(Debug)]
struct MockQueue {
    mode: MockMode,
    responses: VecDeque<HttpResponse>,
}

#[derive(Debug, Default)]
struct Registry {
    queues: HashMap<String, MockQueue>,
    delays: HashMap<String, Duration>,
    requests: Vec<HttpRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    registry: Arc<Mutex<Registry>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `responses` for `endpoint_key`, replacing whatever was there.
    pub fn register(&self, endpoint_key: &str, responses: Vec<HttpResponse>, mode: MockMode) {
        self.registry.lock().queues.insert(
            endpoint_key.to_string(),
            MockQueue {
                mode,
                responses: responses.into(),
            },
        );
    }

    /// Always answer `endpoint_key` with this one response.
    pub fn set_mock(
        &self,
        endpoint_key: &str,
        status_code: u16,
        status: &str,
        body: &str,
        headers: &[(&str, &str)],
    ) {
        let response = generate_response(status_code, status, body, headers);
        self.register(endpoint_key, vec![response], MockMode::RepeatLast);
    }

    /// Answer `endpoint_key` with `responses` in order, one per call.
    pub fn set_mock_sequence(&self, endpoint_key: &str, responses: Vec<HttpResponse>) {
        self.register(endpoint_key, responses, MockMode::ConsumeOnePerCall);
    }

    /// Add one response to the end of the sequence for `endpoint_key`.
    ///
    /// A repeating entry becomes a sequence that starts with its response.
    pub fn append_mock(&self, endpoint_key: &str, response: HttpResponse) {
        let mut registry = self.registry.lock();
        let queue = registry
            .queues
            .entry(endpoint_key.to_string())
            .or_insert_with(|| MockQueue {
                mode: MockMode::ConsumeOnePerCall,
                responses: VecDeque::new(),
            });
        if queue.mode == MockMode::RepeatLast {
            queue.mode = MockMode::ConsumeOnePerCall;
            if let Some(last) = queue.responses.pop_back() {
                queue.responses = VecDeque::from([last]);
            }
        }
        queue.responses.push_back(response);
    }

    /// Make every call to `endpoint_key` take `delay`. A delay longer than the
    /// request's timeout turns into `TransportError::Timeout`.
    pub fn set_delay(&self, endpoint_key: &str, delay: Duration) {
        self.registry
            .lock()
            .delays
            .insert(endpoint_key.to_string(), delay);
    }

    /// Responses still waiting in the sequence for `endpoint_key`.
    pub fn remaining(&self, endpoint_key: &str) -> Option<usize> {
        self.registry
            .lock()
            .queues
            .get(endpoint_key)
            .map(|q| q.responses.len())
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.registry.lock().requests.clone()
    }

    pub fn requests_for(&self, endpoint_key: &str) -> Vec<HttpRequest> {
        self.registry
            .lock()
            .requests
            .iter()
            .filter(|r| r.endpoint_key == endpoint_key)
            .cloned()
            .collect()
    }

    /// Drop all registrations, delays and logged requests.
    pub fn reset(&self) {
        let mut registry = self.registry.lock();
        registry.queues.clear();
        registry.delays.clear();
        registry.requests.clear();
    }

    fn next_response(&self, request: &HttpRequest) -> (Option<Duration>, Result<HttpResponse, TransportError>) {
        let mut registry = self.registry.lock();
        registry.requests.push(request.clone());
        let delay = registry.delays.get(&request.endpoint_key).copied();
        if let Some(delay) = delay {
            if delay > Duration::from_millis(request.timeout_ms) {
                return (
                    Some(Duration::from_millis(request.timeout_ms)),
                    Err(TransportError::Timeout {
                        endpoint_key: request.endpoint_key.clone(),
                        timeout_ms: request.timeout_ms,
                    }),
                );
            }
        }

        let miss = |reason| TransportError::NoMockConfigured {
            endpoint_key: request.endpoint_key.clone(),
            reason,
        };
        let result = match registry.queues.get_mut(&request.endpoint_key) {
            None => Err(miss(MockMiss::Unregistered)),
            Some(queue) => {
                let next = match queue.mode {
                    MockMode::RepeatLast => queue.responses.back().cloned(),
                    MockMode::ConsumeOnePerCall => queue.responses.pop_front(),
                };
                next.ok_or_else(|| miss(MockMiss::Exhausted))
            }
        };
        (delay, result)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let (delay, result) = self.next_response(request);
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if let Err(err) = &result {
            warn!(endpoint_key = %request.endpoint_key, path = %request.path, error = %err, "mock transport miss");
        }
        result
    }
}
