//! Scripted transport for executor tests
//!
//! Replays a queue of canned outcomes in order and records every request
//! it is handed, so tests can assert on call counts, attempted URLs, and
//! the bearer token each attempt carried.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::client::response::RawResponse;
use crate::client::transport::{PreparedRequest, Transport, TransportError};

type Scripted = Arc<Mutex<VecDeque<Result<RawResponse, TransportError>>>>;

/// Transport that replays scripted outcomes
///
/// Clones share the same script and request log, so a test can keep a
/// handle while the client owns the transport.
///
/// # Examples
///
/// ```
/// use tasklane_client::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.push_status(429, "");
/// transport.push_status(200, r#"{"id": "9hz"}"#);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Scripted,
    requests: Arc<Mutex<Vec<PreparedRequest>>>,
}

impl MockTransport {
    /// Create an empty transport; an unscripted send fails as a
    /// connection error
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body
    pub fn push_status(&self, status: u16, body: &str) {
        self.push_response(RawResponse { status, retry_after: None, body: body.to_string() });
    }

    /// Queue a 429 carrying a `Retry-After` header
    pub fn push_rate_limited(&self, retry_after: &str) {
        self.push_response(RawResponse {
            status: 429,
            retry_after: Some(retry_after.to_string()),
            body: String::new(),
        });
    }

    /// Queue a full raw response
    pub fn push_response(&self, response: RawResponse) {
        self.responses.lock().expect("mutex poisoned").push_back(Ok(response));
    }

    /// Queue a transport-level failure
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().expect("mutex poisoned").push_back(Err(error));
    }

    /// Requests seen so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().expect("mutex poisoned").clone()
    }

    /// Number of sends performed
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("mutex poisoned").len()
    }

    /// Scripted outcomes not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().expect("mutex poisoned").len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().expect("mutex poisoned").push(request.clone());
        self.responses.lock().expect("mutex poisoned").pop_front().unwrap_or_else(|| {
            Err(TransportError::Connection("mock transport: no scripted response".to_string()))
        })
    }
}
