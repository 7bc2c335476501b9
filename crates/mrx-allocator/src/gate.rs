//! Per-variant serialization gate.
//!
//! The race-critical section of every allocator operation is a single
//! read-modify-write against one variant's availability. The gate hands out
//! one async mutex per variant slug: operations on the same variant
//! serialize; operations on different variants proceed fully in parallel.
//! A global lock across variants is exactly what this exists to avoid.
//!
//! Entries are created on first touch and kept for the life of the gate —
//! bounded by the catalog's variant count.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per variant slug.
#[derive(Debug, Default)]
pub struct VariantGate {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VariantGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one variant, creating it on first use.
    ///
    /// The returned guard holds the variant's mutex, not the registry map —
    /// holding a guard for variant A never blocks an acquire for variant B.
    pub async fn acquire(&self, variant_slug: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(variant_slug.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_variant_serializes() {
        let gate = Arc::new(VariantGate::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let in_section = in_section.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = gate.acquire("tshirt-m").await;
                let n = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(n, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_variants_do_not_block_each_other() {
        let gate = Arc::new(VariantGate::new());
        let _a = gate.acquire("tshirt-m").await;
        // Must complete immediately even while the other guard is held.
        let acquired = tokio::time::timeout(Duration::from_millis(50), gate.acquire("mug-std"))
            .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn reacquire_after_drop() {
        let gate = VariantGate::new();
        drop(gate.acquire("tshirt-m").await);
        let _again = gate.acquire("tshirt-m").await;
    }
}
