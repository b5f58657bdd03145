//! Per-key write serialization.
//!
//! Two writers on the same (organization, module) key queue behind one
//! async mutex; writers on different keys never contend. Entries nobody
//! holds are pruned once the table grows past `PRUNE_THRESHOLD`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::licensing::LicenseKey;

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<LicenseKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &LicenseKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::OrganizationId;
    use crate::domain::licensing::ModuleCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(org: &str) -> LicenseKey {
        LicenseKey::new(
            OrganizationId::new(org).unwrap(),
            ModuleCode::new("meter_reading").unwrap(),
        )
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock(&key("org-a")).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyLocks::new();
        let _a = locks.lock(&key("org-a")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&key("org-b"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.tracked(), 2);
    }
}
