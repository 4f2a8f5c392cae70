//! Scripted in-memory transport for tests
//!
//! Replies are chosen per method: one-shot replies queued with
//! [`MockTransport::enqueue`] are consumed first, then the standing reply
//! set with [`MockTransport::respond`]. Every request is recorded, including
//! the ones that fail.

use super::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Body of a registry with no applications
pub const EMPTY_APPS_BODY: &str = r#"{"applications": {"versions__delta": "1", "application": []}}"#;

/// What the mock answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A completed exchange
    Response(HttpResponse),
    /// A failed exchange
    Fail(TransportError),
}

impl MockReply {
    /// Response with an empty body
    pub fn status(status: u16) -> Self {
        Self::Response(HttpResponse::new(status, ""))
    }

    /// Response with a body
    pub fn body(status: u16, body: impl Into<String>) -> Self {
        Self::Response(HttpResponse::new(status, body))
    }

    /// Connection refused
    pub fn fail() -> Self {
        Self::Fail(TransportError::connection("connection refused"))
    }
}

#[derive(Debug, Default)]
struct MockState {
    queued: HashMap<HttpMethod, VecDeque<MockReply>>,
    standing: HashMap<HttpMethod, MockReply>,
    requests: Vec<HttpRequest>,
    offline: bool,
}

/// Transport that replays scripted replies
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// A registry that accepts everything and knows no applications
    pub fn new() -> Self {
        let mock = Self::default();
        mock.respond(HttpMethod::Post, MockReply::status(204));
        mock.respond(HttpMethod::Put, MockReply::status(200));
        mock.respond(HttpMethod::Delete, MockReply::status(200));
        mock.respond(HttpMethod::Get, MockReply::body(200, EMPTY_APPS_BODY));
        mock
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Set the standing reply for a method
    pub fn respond(&self, method: HttpMethod, reply: MockReply) {
        self.with_state(|s| {
            s.standing.insert(method, reply);
        });
    }

    /// Queue a one-shot reply for a method
    pub fn enqueue(&self, method: HttpMethod, reply: MockReply) {
        self.with_state(|s| s.queued.entry(method).or_default().push_back(reply));
    }

    /// Fail every request while offline
    pub fn set_offline(&self, offline: bool) {
        self.with_state(|s| s.offline = offline);
    }

    /// All recorded requests in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.with_state(|s| s.requests.clone())
    }

    /// Methods of all recorded requests in order
    pub fn methods(&self) -> Vec<HttpMethod> {
        self.with_state(|s| s.requests.iter().map(|r| r.method).collect())
    }

    /// Number of recorded requests with the given method
    pub fn count(&self, method: HttpMethod) -> usize {
        self.with_state(|s| s.requests.iter().filter(|r| r.method == method).count())
    }

    /// Forget recorded requests
    pub fn clear_requests(&self) {
        self.with_state(|s| s.requests.clear());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = self.with_state(|s| {
            let method = request.method;
            s.requests.push(request);
            if s.offline {
                return MockReply::fail();
            }
            s.queued
                .get_mut(&method)
                .and_then(VecDeque::pop_front)
                .or_else(|| s.standing.get(&method).cloned())
                .unwrap_or_else(|| MockReply::status(404))
        });

        match reply {
            MockReply::Response(response) => Ok(response),
            MockReply::Fail(err) => Err(err),
        }
    }
}
