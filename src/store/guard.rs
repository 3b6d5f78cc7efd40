//! Scoped exclusive access to the saved-command namespace
//!
//! The wireless callbacks, web handlers and the scheduler all reach the same
//! store. Every access goes through a [`StoreLease`], which releases on drop,
//! so early returns and errors never leave the namespace locked. Writes the
//! holder staged but never committed are rolled back on release.

use irblaster_shared::{KvStore, SavedCommands, SavedError, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{error, warn};

/// Cloneable handle to the guarded store
#[derive(Clone)]
pub struct StoreGuard {
    inner: Arc<Mutex<Box<dyn KvStore>>>,
    lock_timeout: Duration,
}

/// Exclusive access to the store for as long as it lives
pub struct StoreLease {
    guard: OwnedMutexGuard<Box<dyn KvStore>>,
}

impl StoreLease {
    /// Saved-command operations over the leased namespace
    pub fn saved(&mut self) -> SavedCommands<'_> {
        SavedCommands::new(&mut **self.guard)
    }
}

impl Drop for StoreLease {
    fn drop(&mut self) {
        self.guard.rollback();
    }
}

impl StoreGuard {
    /// Wrap a store; callers give up after `lock_timeout`
    pub fn new(store: impl KvStore + 'static, lock_timeout: Duration) -> Self {
        let store: Box<dyn KvStore> = Box::new(store);
        Self {
            inner: Arc::new(Mutex::new(store)),
            lock_timeout,
        }
    }

    /// Wait for exclusive access, failing with `Unavailable` on timeout
    pub async fn acquire(&self) -> Result<StoreLease, StoreError> {
        match timeout(self.lock_timeout, self.inner.clone().lock_owned()).await {
            Ok(guard) => Ok(StoreLease { guard }),
            Err(_) => {
                warn!(
                    "[STORE] Lock not acquired within {} ms",
                    self.lock_timeout.as_millis()
                );
                Err(StoreError::Unavailable)
            }
        }
    }

    /// Run a saved-command operation under one acquisition
    ///
    /// The operation does synchronous backend I/O, so it runs on the blocking
    /// pool while the lease is held.
    pub async fn with_saved<T, F>(&self, f: F) -> Result<T, SavedError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SavedCommands<'_>) -> Result<T, SavedError> + Send + 'static,
    {
        let mut lease = self.acquire().await?;
        tokio::task::spawn_blocking(move || f(&mut lease.saved()))
            .await
            .unwrap_or_else(|e| {
                error!("[STORE] Store task failed: {}", e);
                Err(SavedError::Store(StoreError::Backend(e.to_string())))
            })
    }
}
