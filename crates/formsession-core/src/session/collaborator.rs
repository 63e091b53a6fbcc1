//! Collaborator traits for persisting and re-fetching the edited record.
//!
//! Defines the seams between a form session and whatever backend owns the
//! record (HTTP API, database, in-memory fixture).

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

/// Persists a record on behalf of a form session.
///
/// The error's display text is shown to the user as-is, so implementations
/// should return messages that make sense next to the form
/// (e.g. "Email already taken").
#[async_trait]
pub trait RecordSaver<R: Send + Sync>: Send + Sync {
    /// Saves the record.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Record accepted
    /// - `Err(_)`: Save rejected; the session keeps the user's edits
    async fn save(&self, data: &R) -> Result<()>;
}

/// Re-fetches the authoritative copy of a record.
#[async_trait]
pub trait RecordSource<R: Send + Sync>: Send + Sync {
    async fn fetch(&self) -> Result<R>;
}

/// Holds a single record in memory and serves as both saver and source.
///
/// Useful for demos and tests. `fail_next_save` queues a one-shot failure.
#[derive(Debug)]
pub struct InMemoryRecordStore<R> {
    record: Mutex<R>,
    save_count: AtomicUsize,
    fetch_count: AtomicUsize,
    next_failure: Mutex<Option<String>>,
}

impl<R: Clone> InMemoryRecordStore<R> {
    pub fn new(record: R) -> Self {
        Self {
            record: Mutex::new(record),
            save_count: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
            next_failure: Mutex::new(None),
        }
    }

    /// The stored record.
    pub fn record(&self) -> R {
        lock(&self.record).clone()
    }

    /// Replaces the stored record, as another user editing it would.
    pub fn replace(&self, record: R) {
        *lock(&self.record) = record;
    }

    /// Makes the next save fail with `reason`.
    pub fn fail_next_save(&self, reason: impl Into<String>) {
        *lock(&self.next_failure) = Some(reason.into());
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> RecordSaver<R> for InMemoryRecordStore<R> {
    async fn save(&self, data: &R) -> Result<()> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = lock(&self.next_failure).take() {
            return Err(anyhow!(reason));
        }
        *lock(&self.record) = data.clone();
        Ok(())
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> RecordSource<R> for InMemoryRecordStore<R> {
    async fn fetch(&self) -> Result<R> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.record())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
