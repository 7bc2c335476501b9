//! Order-service boundary.
//!
//! This module defines **only** the collaborator trait the reaper consumes.
//! The order/invoice subsystem lives outside this workspace; deployments
//! inject their own implementation.

use anyhow::Result;

/// The slice of the order/invoice service the reaper needs.
///
/// Called only by the reaper — checkout and payment flows never go through
/// this trait.
#[async_trait::async_trait]
pub trait OrderService: Send + Sync {
    /// Whether the order is still in a cancellable pending state.
    async fn is_cancellable(&self, order_id: &str) -> Result<bool>;

    /// Instruct the order subsystem to cancel, recording `reason`.
    async fn cancel(&self, order_id: &str, reason: &str) -> Result<()>;
}

/// Order service that never cancels anything.
///
/// For deployments where order cancellation is driven elsewhere (or not at
/// all): the sweep still clears expired overlays, it just skips the cancel
/// step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOrderService;

#[async_trait::async_trait]
impl OrderService for NullOrderService {
    async fn is_cancellable(&self, _order_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn cancel(&self, _order_id: &str, _reason: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_service_reports_nothing_cancellable() {
        let svc = NullOrderService;
        assert!(!svc.is_cancellable("ORD-A").await.unwrap());
        svc.cancel("ORD-A", "reservation expired").await.unwrap();
    }

    #[tokio::test]
    async fn order_service_is_object_safe_via_arc() {
        let _svc: std::sync::Arc<dyn OrderService> = std::sync::Arc::new(NullOrderService);
    }
}
