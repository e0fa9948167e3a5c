//! HTTP transport implementation.
//!
//! The engine stays agnostic of HTTP libraries: the application
//! provides an [`HttpClient`] backed by whatever stack it already uses
//! (reqwest, ureq, a platform webview), and [`HttpTransport`] maps the
//! sync protocol onto it as JSON request/response bodies.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use chrono::{DateTime, SecondsFormat, Utc};
use recall_protocol::{PullResponse, PushRequest, PushResponse};
use std::time::Duration;

/// Minimal HTTP client surface.
///
/// Implementations must treat a non-2xx status, a connection failure,
/// or an expired `timeout` as an `Err`; the transport classifies those
/// as retryable. The returned string is the response body.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str, timeout: Duration) -> Result<String, String>;

    /// Sends a POST request with a JSON body.
    fn post(&self, url: &str, body: String, timeout: Duration) -> Result<String, String>;
}

/// JSON-over-HTTP sync transport.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
    timeout: Duration,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport rooted at `base_url`
    /// (e.g. `https://api.example.com/api/v1`).
    pub fn new(base_url: impl Into<String>, client: C, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            timeout,
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn pull(&self, since: Option<DateTime<Utc>>) -> SyncResult<PullResponse> {
        let url = match since {
            Some(watermark) => format!(
                "{}/sync/pull?since={}",
                self.base_url,
                watermark.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            None => format!("{}/sync/pull", self.base_url),
        };

        let body = self
            .client
            .get(&url, self.timeout)
            .map_err(SyncError::transport_retryable)?;

        serde_json::from_str(&body)
            .map_err(|err| SyncError::Protocol(format!("bad pull response: {err}")))
    }

    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let body = serde_json::to_string(request)
            .map_err(|err| SyncError::Protocol(format!("failed to encode push request: {err}")))?;

        let url = format!("{}/sync/push", self.base_url);
        let response = self
            .client
            .post(&url, body, self.timeout)
            .map_err(SyncError::transport_retryable)?;

        serde_json::from_str(&response)
            .map_err(|err| SyncError::Protocol(format!("bad push response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct TestClient {
        response: Mutex<Option<String>>,
        requests: Mutex<Vec<String>>,
        fail: Mutex<bool>,
    }

    impl TestClient {
        fn set_response(&self, body: &str) {
            *self.response.lock() = Some(body.to_string());
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for TestClient {
        fn get(&self, url: &str, _timeout: Duration) -> Result<String, String> {
            self.requests.lock().push(url.to_string());
            if *self.fail.lock() {
                return Err("connection refused".into());
            }
            self.response.lock().clone().ok_or_else(|| "no response".into())
        }

        fn post(&self, url: &str, _body: String, _timeout: Duration) -> Result<String, String> {
            self.requests.lock().push(url.to_string());
            if *self.fail.lock() {
                return Err("connection refused".into());
            }
            self.response.lock().clone().ok_or_else(|| "no response".into())
        }
    }

    fn transport(client: TestClient) -> HttpTransport<TestClient> {
        HttpTransport::new("https://api.test/api/v1", client, Duration::from_secs(5))
    }

    #[test]
    fn pull_without_watermark_has_no_query() {
        let client = TestClient::default();
        client.set_response(r#"{"server_timestamp":"2024-05-01T00:00:00Z"}"#);
        let transport = transport(client);

        let response = transport.pull(None).unwrap();
        assert!(response.decks.is_empty());
        assert_eq!(
            transport.client.requests(),
            vec!["https://api.test/api/v1/sync/pull"]
        );
    }

    #[test]
    fn pull_encodes_watermark_in_query() {
        let client = TestClient::default();
        client.set_response(r#"{"server_timestamp":"2024-05-01T00:00:00Z"}"#);
        let transport = transport(client);

        let since = Utc.with_ymd_and_hms(2024, 4, 30, 12, 0, 0).unwrap();
        transport.pull(Some(since)).unwrap();
        assert_eq!(
            transport.client.requests(),
            vec!["https://api.test/api/v1/sync/pull?since=2024-04-30T12:00:00.000Z"]
        );
    }

    #[test]
    fn client_failure_is_retryable() {
        let client = TestClient::default();
        *client.fail.lock() = true;
        let transport = transport(client);

        let err = transport.pull(None).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn garbled_body_is_a_protocol_error() {
        let client = TestClient::default();
        client.set_response("<html>504 gateway timeout</html>");
        let transport = transport(client);

        let err = transport.pull(None).unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn push_posts_to_the_push_endpoint() {
        let client = TestClient::default();
        client.set_response("{}");
        let transport = transport(client);

        let response = transport.push(&PushRequest::default()).unwrap();
        assert!(response.conflicts.is_empty());
        assert_eq!(
            transport.client.requests(),
            vec!["https://api.test/api/v1/sync/push"]
        );
    }
}
