use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutexes keyed by owner phone.
///
/// Held around every read-modify-write of a user record so concurrent check
/// creation and removal cannot overwrite each other's edits to `checks`.
#[derive(Debug, Clone, Default)]
pub struct OwnerLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, phone: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(phone.to_string()).or_default().value());
        lock.lock_owned().await
    }
}
