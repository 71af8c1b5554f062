//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted behind a trait so different
//! libraries (reqwest, ureq, a test double) can drive the same JSON
//! protocol.

use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;
use rowsync_core::ChangeEntry;
use rowsync_protocol::{
    changes_query, ChangesPage, PushAccepted, PushChanges, RegisterRequest, RegisterResponse,
    CHANGES_PATH, REGISTER_PATH,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP client abstraction.
///
/// Implementations return the raw response body on success and a
/// message on connection-level failure. Non-2xx statuses should be
/// reported as errors.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str) -> Result<Vec<u8>, String>;

    /// Sends a POST request with a JSON body.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;
}

/// HTTP-based sync transport speaking the JSON wire protocol.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport against a server base URL.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn decode<T: DeserializeOwned>(body: &[u8]) -> SyncResult<T> {
        serde_json::from_slice(body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))
    }

    fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let body = self
            .client
            .get(&url)
            .map_err(SyncError::transport_retryable)?;
        Self::decode(&body)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> SyncResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let encoded = serde_json::to_vec(body)
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;
        let response = self
            .client
            .post(&url, encoded)
            .map_err(SyncError::transport_retryable)?;
        Self::decode(&response)
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn pull(&self, since: u64, exclude_origin: &str, limit: u32) -> SyncResult<ChangesPage> {
        let query = changes_query(since, exclude_origin, limit);
        self.get_json(&format!("{CHANGES_PATH}?{query}"))
    }

    fn push(&self, changes: &[ChangeEntry]) -> SyncResult<PushAccepted> {
        self.post_json(CHANGES_PATH, &PushChanges::new(changes.to_vec()))
    }

    fn register(&self, device_key: &str) -> SyncResult<RegisterResponse> {
        self.post_json(
            REGISTER_PATH,
            &RegisterRequest {
                device_key: device_key.to_string(),
            },
        )
    }
}
