//! Debounced auto-save timer.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Runs one job after `delay`, restarting the countdown on every `schedule`.
///
/// Each scheduled job gets its own cancellation token. Scheduling again
/// cancels the previous token, so at most one countdown is live.
#[derive(Debug)]
pub(crate) struct AutoSaveTimer {
    delay: Option<Duration>,
    pending: Mutex<Option<CancellationToken>>,
}

impl AutoSaveTimer {
    pub(crate) fn new(delay: Option<Duration>) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.delay.is_some()
    }

    /// True while a countdown is running and has not fired yet.
    pub(crate) fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// (Re)starts the countdown. Returns false when auto-save is disabled or
    /// no tokio runtime is available to run the timer.
    pub(crate) fn schedule<F, Fut>(&self, job: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(delay) = self.delay else {
            return false;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Auto-save requested outside a tokio runtime, skipping");
            return false;
        };

        let token = CancellationToken::new();
        if let Some(previous) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            previous.cancel();
        }

        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::trace!("Auto-save countdown cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    // Mark as fired so is_pending() reports false during the save.
                    token.cancel();
                    tracing::debug!("Auto-save delay of {:?} elapsed, saving", delay);
                    job().await;
                }
            }
        });
        true
    }

    /// Cancels the running countdown. Returns true if one was pending.
    pub(crate) fn cancel(&self) -> bool {
        match self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }
}
