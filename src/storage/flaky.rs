//! Fault-injecting blob store for exercising failure paths

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BlobError, BlobStore, Result};

/// Which local-storage failure `put` should report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutFailure {
    QuotaExceeded,
    Unavailable,
}

/// Wraps another [`BlobStore`] and fails selected operations on demand
///
/// Delete and get failures are armed per photo: any key ending in the given
/// suffix fails until healed.
pub struct FlakyBlobStore {
    inner: Arc<dyn BlobStore>,
    put_failure: Mutex<Option<PutFailure>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_gets: Mutex<HashSet<String>>,
}

impl FlakyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            put_failure: Mutex::new(None),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_gets: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_puts(&self, failure: PutFailure) {
        *lock(&self.put_failure) = Some(failure);
    }

    pub fn fail_delete_of(&self, key_suffix: impl Into<String>) {
        lock(&self.failing_deletes).insert(key_suffix.into());
    }

    pub fn fail_get_of(&self, key_suffix: impl Into<String>) {
        lock(&self.failing_gets).insert(key_suffix.into());
    }

    /// Clear every armed failure
    pub fn heal(&self) {
        *lock(&self.put_failure) = None;
        lock(&self.failing_deletes).clear();
        lock(&self.failing_gets).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn matches_any(suffixes: &HashSet<String>, key: &str) -> bool {
    suffixes.iter().any(|suffix| key.ends_with(suffix.as_str()))
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let failure = *lock(&self.put_failure);
        match failure {
            Some(PutFailure::QuotaExceeded) => {
                Err(BlobError::QuotaExceeded(format!("injected quota failure for {key}")))
            }
            Some(PutFailure::Unavailable) => {
                Err(BlobError::Unavailable(format!("injected outage for {key}")))
            }
            None => self.inner.put(key, data).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let failing = matches_any(&lock(&self.failing_gets), key);
        if failing {
            return Err(BlobError::Unavailable(format!("injected read failure for {key}")));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let failing = matches_any(&lock(&self.failing_deletes), key);
        if failing {
            return Err(BlobError::Unavailable(format!("injected delete failure for {key}")));
        }
        self.inner.delete(key).await
    }
}
