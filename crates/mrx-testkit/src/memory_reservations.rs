use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use mrx_allocator::ReservationStore;
use mrx_schemas::{ReservationRecord, ReservationStatus};
use uuid::Uuid;

/// Vector-backed [`ReservationStore`].
///
/// Row order is insertion order, so scenario assertions are deterministic.
#[derive(Debug, Default)]
pub struct MemoryReservationStore {
    rows: Mutex<Vec<ReservationRecord>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, in insertion order.
    pub fn all(&self) -> Vec<ReservationRecord> {
        self.rows.lock().expect("rows lock").clone()
    }

    /// Rows currently in the given status.
    pub fn in_status(&self, status: ReservationStatus) -> Vec<ReservationRecord> {
        self.all()
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }
}

#[async_trait::async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn insert(&self, record: ReservationRecord) -> Result<()> {
        self.rows.lock().expect("rows lock").push(record);
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().expect("rows lock");
        for row in rows.iter_mut() {
            if row.id == id && row.status == from {
                row.status = to;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn find_active(
        &self,
        order_id: &str,
        variant_slug: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReservationRecord>> {
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .find(|r| r.order_id == order_id && r.variant_slug == variant_slug && r.is_active(now))
            .cloned())
    }

    async fn find_by_order(&self, order_id: &str) -> Result<Vec<ReservationRecord>> {
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn find_expired_reserved(&self, now: DateTime<Utc>) -> Result<Vec<ReservationRecord>> {
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect())
    }

    async fn active_quantity(&self, variant_slug: &str, now: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .filter(|r| r.variant_slug == variant_slug && r.is_active(now))
            .map(|r| r.quantity)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(order_id: &str, expires_in_secs: i64, status: ReservationStatus) -> ReservationRecord {
        let now = Utc::now();
        ReservationRecord {
            id: Uuid::new_v4(),
            product_slug: "tshirt".to_string(),
            variant_slug: "tshirt-m".to_string(),
            order_id: order_id.to_string(),
            quantity: 2,
            reserved_at: now,
            expires_at: now + Duration::seconds(expires_in_secs),
            status,
        }
    }

    #[tokio::test]
    async fn active_quantity_excludes_expired_and_terminal_rows() {
        let store = MemoryReservationStore::new();
        store.insert(row("ORD-A", 60, ReservationStatus::Reserved)).await.unwrap();
        store.insert(row("ORD-B", -60, ReservationStatus::Reserved)).await.unwrap();
        store.insert(row("ORD-C", 60, ReservationStatus::Confirmed)).await.unwrap();

        let sum = store.active_quantity("tshirt-m", Utc::now()).await.unwrap();
        assert_eq!(sum, 2);
    }

    #[tokio::test]
    async fn update_status_is_compare_and_set() {
        let store = MemoryReservationStore::new();
        let r = row("ORD-A", 60, ReservationStatus::Reserved);
        let id = r.id;
        store.insert(r).await.unwrap();

        assert!(store
            .update_status(id, ReservationStatus::Reserved, ReservationStatus::Released)
            .await
            .unwrap());
        // Second flip from Reserved fails: the row is no longer Reserved.
        assert!(!store
            .update_status(id, ReservationStatus::Reserved, ReservationStatus::Confirmed)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn expired_scan_only_returns_reserved_rows() {
        let store = MemoryReservationStore::new();
        store.insert(row("ORD-A", -60, ReservationStatus::Reserved)).await.unwrap();
        store.insert(row("ORD-B", -60, ReservationStatus::Released)).await.unwrap();

        let expired = store.find_expired_reserved(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].order_id, "ORD-A");
    }
}
