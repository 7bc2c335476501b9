use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{bail, Result};
use mrx_reaper::OrderService;

/// Order service that records what the reaper tells it.
///
/// Orders are non-cancellable unless marked; cancels can be made to fail
/// per order so sweep isolation behavior is testable.
#[derive(Debug, Default)]
pub struct RecordingOrderService {
    cancellable: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    cancelled: Mutex<Vec<(String, String)>>,
}

impl RecordingOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an order as still pending, so the reaper will try to cancel it.
    pub fn mark_cancellable(&self, order_id: &str) {
        self.cancellable
            .lock()
            .expect("cancellable lock")
            .insert(order_id.to_string());
    }

    /// Make cancel calls for this order fail.
    pub fn fail_cancel_for(&self, order_id: &str) {
        self.failing
            .lock()
            .expect("failing lock")
            .insert(order_id.to_string());
    }

    /// `(order_id, reason)` pairs in cancellation order.
    pub fn cancelled(&self) -> Vec<(String, String)> {
        self.cancelled.lock().expect("cancelled lock").clone()
    }
}

#[async_trait::async_trait]
impl OrderService for RecordingOrderService {
    async fn is_cancellable(&self, order_id: &str) -> Result<bool> {
        Ok(self
            .cancellable
            .lock()
            .expect("cancellable lock")
            .contains(order_id))
    }

    async fn cancel(&self, order_id: &str, reason: &str) -> Result<()> {
        if self.failing.lock().expect("failing lock").contains(order_id) {
            bail!("order service unavailable for {order_id}");
        }
        self.cancelled
            .lock()
            .expect("cancelled lock")
            .push((order_id.to_string(), reason.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unmarked_orders_are_not_cancellable() {
        let svc = RecordingOrderService::new();
        assert!(!svc.is_cancellable("ORD-A").await.unwrap());
        svc.mark_cancellable("ORD-A");
        assert!(svc.is_cancellable("ORD-A").await.unwrap());
    }

    #[tokio::test]
    async fn cancel_records_order_and_reason() {
        let svc = RecordingOrderService::new();
        svc.cancel("ORD-A", "reservation expired").await.unwrap();
        assert_eq!(
            svc.cancelled(),
            vec![("ORD-A".to_string(), "reservation expired".to_string())]
        );
    }

    #[tokio::test]
    async fn failing_orders_error_without_recording() {
        let svc = RecordingOrderService::new();
        svc.fail_cancel_for("ORD-A");
        assert!(svc.cancel("ORD-A", "reservation expired").await.is_err());
        assert!(svc.cancelled().is_empty());
    }
}
