//! Mock record source for testing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{FetchFuture, RecordSource, SourceError};
use crate::{Roster, SourceKind, SourceRecord};

/// A configurable response for [`MockSource`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    Records(Vec<SourceRecord>),
    Error(String),
}

/// A hand-rolled mock implementing [`RecordSource`] for tests.
///
/// Returns a fixed response, or a sequence of responses (one per call,
/// repeating the last once exhausted), with optional per-call latency.
pub struct MockSource {
    kind: SourceKind,
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockSource {
    /// A mock that always returns `records`.
    pub fn new(kind: SourceKind, records: Vec<SourceRecord>) -> Self {
        Self::with_response(kind, MockResponse::Records(records))
    }

    /// A mock that always fails with `message`.
    pub fn failing(kind: SourceKind, message: impl Into<String>) -> Self {
        Self::with_response(kind, MockResponse::Error(message.into()))
    }

    pub fn with_response(kind: SourceKind, response: MockResponse) -> Self {
        Self {
            kind,
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Responses returned in order; the last repeats. An empty sequence
    /// behaves like a source with no records.
    pub fn with_sequence(kind: SourceKind, mut responses: Vec<MockResponse>) -> Self {
        let fallback = responses
            .last()
            .cloned()
            .unwrap_or(MockResponse::Records(Vec::new()));
        // reversed so pop() yields them front to back
        responses.reverse();
        Self {
            kind,
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `fetch()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl RecordSource for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch<'a>(&'a self, _roster: &'a Roster) -> FetchFuture<'a> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        let delay = self.delay;
        let kind = self.kind;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockResponse::Records(records) => Ok(records),
                MockResponse::Error(message) => Err(SourceError::Other { kind, message }),
            }
        })
    }
}
