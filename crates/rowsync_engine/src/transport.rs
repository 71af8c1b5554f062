//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use rowsync_core::ChangeEntry;
use rowsync_protocol::{ChangesPage, PushAccepted, RegisterResponse};
use std::collections::VecDeque;

/// Moves change batches and registry calls over a request/response
/// channel.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP, in-process loopback, mock for testing).
pub trait Transport: Send + Sync {
    /// Fetches the peer's changes after `since`, excluding entries
    /// authored by `exclude_origin`, up to `limit`.
    fn pull(&self, since: u64, exclude_origin: &str, limit: u32) -> SyncResult<ChangesPage>;

    /// Ships locally authored changes; the response confirms the
    /// highest processed change id.
    fn push(&self, changes: &[ChangeEntry]) -> SyncResult<PushAccepted>;

    /// Asks the peer's registry for a node id for `device_key`.
    fn register(&self, device_key: &str) -> SyncResult<RegisterResponse>;
}

/// A mock transport for testing.
///
/// Pull pages are queued and served in order; an exhausted queue yields
/// empty terminal pages. Pushed batches are recorded and acknowledged
/// in full unless a partial confirmation is configured.
#[derive(Default)]
pub struct MockTransport {
    pull_pages: Mutex<VecDeque<ChangesPage>>,
    pushed: Mutex<Vec<Vec<ChangeEntry>>>,
    accept_up_to: Mutex<Option<u64>>,
    register_response: Mutex<Option<RegisterResponse>>,
    fail_next: Mutex<Option<String>>,
}

impl MockTransport {
    /// Creates a mock with no canned responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a pull page.
    pub fn queue_pull_page(&self, page: ChangesPage) {
        self.pull_pages.lock().push_back(page);
    }

    /// Makes push acknowledge only up to the given change id.
    pub fn confirm_up_to(&self, change_id: u64) {
        *self.accept_up_to.lock() = Some(change_id);
    }

    /// Sets the registration response.
    pub fn set_register_response(&self, response: RegisterResponse) {
        *self.register_response.lock() = Some(response);
    }

    /// Makes the next call fail with a retryable transport error.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Batches recorded by `push`, in call order.
    pub fn pushed_batches(&self) -> Vec<Vec<ChangeEntry>> {
        self.pushed.lock().clone()
    }

    fn take_failure(&self) -> SyncResult<()> {
        if let Some(message) = self.fail_next.lock().take() {
            return Err(SyncError::transport_retryable(message));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn pull(&self, _since: u64, _exclude_origin: &str, _limit: u32) -> SyncResult<ChangesPage> {
        self.take_failure()?;
        Ok(self
            .pull_pages
            .lock()
            .pop_front()
            .unwrap_or_else(ChangesPage::empty))
    }

    fn push(&self, changes: &[ChangeEntry]) -> SyncResult<PushAccepted> {
        self.take_failure()?;
        self.pushed.lock().push(changes.to_vec());

        let shipped_high = changes.last().map(|e| e.change_id).unwrap_or(0);
        let highest = match *self.accept_up_to.lock() {
            Some(limit) => shipped_high.min(limit),
            None => shipped_high,
        };
        Ok(PushAccepted {
            highest_accepted_change_id: highest,
        })
    }

    fn register(&self, _device_key: &str) -> SyncResult<RegisterResponse> {
        self.take_failure()?;
        (*self.register_response.lock())
            .ok_or_else(|| SyncError::Protocol("no mock register response set".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_serves_terminal_pages() {
        let transport = MockTransport::new();
        let page = transport.pull(0, "1", 100).unwrap();
        assert!(page.changes.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn queued_pages_come_back_in_order() {
        let transport = MockTransport::new();
        transport.queue_pull_page(ChangesPage::new(vec![], true));
        transport.queue_pull_page(ChangesPage::new(vec![], false));

        assert!(transport.pull(0, "1", 100).unwrap().has_more);
        assert!(!transport.pull(0, "1", 100).unwrap().has_more);
    }

    #[test]
    fn push_confirms_shipped_high_by_default() {
        let transport = MockTransport::new();
        let ack = transport.push(&[]).unwrap();
        assert_eq!(ack.highest_accepted_change_id, 0);
    }

    #[test]
    fn fail_next_is_one_shot() {
        let transport = MockTransport::new();
        transport.fail_next("connection reset");

        let err = transport.pull(0, "1", 100).unwrap_err();
        assert!(err.is_retryable());

        assert!(transport.pull(0, "1", 100).is_ok());
    }
}
