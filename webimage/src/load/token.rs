//! Cancellation handle for a single load.

use tokio_util::sync::CancellationToken;

use crate::operation::Cancellable;

/// Handle returned for every load.
///
/// Cancelling it withdraws this caller's interest: no further event is
/// delivered for the load, and if it was the last waiter on a coalesced
/// fetch, the fetch itself is aborted. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct LoadToken {
    cancel: CancellationToken,
}

impl LoadToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

impl Cancellable for LoadToken {
    fn cancel(&self) {
        LoadToken::cancel(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = LoadToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = LoadToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        Cancellable::cancel(&token);
        task.await.unwrap();
    }
}
