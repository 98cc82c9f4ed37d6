//! Cancellation handle returned for every started stream.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running stream.
///
/// Cancelling is permanent and idempotent. Once cancelled, no further
/// callback fires for the stream and its connection is dropped at the next
/// suspension point. Dropping the handle does not cancel.
#[derive(Debug)]
pub struct StreamHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub(crate) fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            token,
            task: Some(task),
        }
    }

    /// Signal cancellation. Calling more than once has no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A detached zero-argument cancel function, for callers that store it
    /// apart from the handle (UI teardown, signal handlers).
    pub fn cancel_fn(&self) -> impl Fn() + Send + Sync + 'static {
        let token = self.token.clone();
        move || token.cancel()
    }

    /// Wait for the stream task to exit, whatever the outcome.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::error!("Stream task failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        let task = tokio::spawn(async {});
        let handle = StreamHandle::new(token.clone(), task);

        assert!(!handle.is_cancelled());
        handle.cancel();
        handle.cancel();
        let cancel = handle.cancel_fn();
        cancel();
        assert!(handle.is_cancelled());
        assert!(token.is_cancelled());

        handle.join().await;
    }
}
