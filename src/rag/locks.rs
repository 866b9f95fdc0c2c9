//! Per-file async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type FileKey = (String, String);

/// Serializes work on the same `(context_id, file_id)` pair while letting
/// different pairs proceed concurrently.
#[derive(Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<FileKey, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one run; releases and prunes the entry on drop.
pub struct FileLockGuard<'a> {
    owner: &'a FileLocks,
    key: FileKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, context_id: &str, file_id: &str) -> FileLockGuard<'_> {
        let key = (context_id.to_string(), file_id.to_string());
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        FileLockGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked (held or awaited).
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map still references the mutex: nobody holds or awaits it.
        if locks
            .get(&self.key)
            .map_or(false, |mutex| Arc::strong_count(mutex) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
