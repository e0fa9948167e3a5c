//! Transport abstraction for sync network calls.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use recall_protocol::{PullResponse, PushRequest, PushResponse};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Network access for the sync cycle.
///
/// The trait abstracts the wire so tests can script responses and the
/// application can plug in whichever HTTP stack it already uses (see
/// [`crate::http`]).
pub trait SyncTransport: Send + Sync {
    /// Fetches the authoritative delta since `since`, or a full
    /// snapshot when `since` is `None`.
    fn pull(&self, since: Option<DateTime<Utc>>) -> SyncResult<PullResponse>;

    /// Submits local creations, updates and deletions.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;
}

/// A scripted transport for tests.
///
/// Responses are set up front; every call is counted and push payloads
/// are recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    pull_response: Mutex<Option<PullResponse>>,
    push_response: Mutex<Option<PushResponse>>,
    fail_pull: AtomicBool,
    fail_push: AtomicBool,
    pull_calls: AtomicU64,
    push_calls: AtomicU64,
    pulls: Mutex<Vec<Option<DateTime<Utc>>>>,
    pushes: Mutex<Vec<PushRequest>>,
}

impl MockTransport {
    /// Creates a transport with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for subsequent pulls.
    pub fn set_pull_response(&self, response: PullResponse) {
        *self.pull_response.lock() = Some(response);
    }

    /// Scripts the response for subsequent pushes.
    pub fn set_push_response(&self, response: PushResponse) {
        *self.push_response.lock() = Some(response);
    }

    /// Makes subsequent pulls fail with a retryable transport error.
    pub fn fail_pulls(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent pushes fail with a retryable transport error.
    pub fn fail_pushes(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Number of pulls attempted.
    #[must_use]
    pub fn pull_calls(&self) -> u64 {
        self.pull_calls.load(Ordering::SeqCst)
    }

    /// Number of pushes attempted.
    #[must_use]
    pub fn push_calls(&self) -> u64 {
        self.push_calls.load(Ordering::SeqCst)
    }

    /// The watermark sent with every pull so far.
    #[must_use]
    pub fn pulls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.pulls.lock().clone()
    }

    /// Every push payload sent so far.
    #[must_use]
    pub fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn pull(&self, since: Option<DateTime<Utc>>) -> SyncResult<PullResponse> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        self.pulls.lock().push(since);
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("mock pull failure"));
        }
        self.pull_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no mock pull response set".into()))
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.pushes.lock().push(request.clone());
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("mock push failure"));
        }
        self.push_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no mock push response set".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mock_counts_calls() {
        let transport = MockTransport::new();
        let ts = Utc.timestamp_opt(1, 0).unwrap();
        transport.set_pull_response(PullResponse::new(ts, vec![], vec![]));

        transport.pull(None).unwrap();
        transport.pull(Some(ts)).unwrap();
        assert_eq!(transport.pull_calls(), 2);
        assert_eq!(transport.push_calls(), 0);
    }

    #[test]
    fn mock_failure_is_retryable() {
        let transport = MockTransport::new();
        transport.fail_pulls(true);
        let err = transport.pull(None).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn mock_records_push_payloads() {
        let transport = MockTransport::new();
        transport.set_push_response(PushResponse::default());

        transport.push(&PushRequest::default()).unwrap();
        assert_eq!(transport.pushes().len(), 1);
    }
}
