use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-name write locks. Writes to one backend name are serialized; writes
/// to distinct names proceed concurrently.
#[derive(Debug, Default)]
pub struct NameLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, name: &str) -> NameGuard<'_> {
        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        NameGuard {
            locks: self,
            name: name.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Held lock on one name. The table entry goes away with the last holder
/// or waiter, so the table only tracks names in use.
pub struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Cloning happens under the shard lock, so the count is stable here.
        self.locks
            .locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}
