use std::sync::Arc;

use anyhow::Result;
use kopilka_db::models::store::{Order, OrderStatus};
use tracing::{info, warn};

use crate::store::OrderStore;

#[derive(Debug)]
pub enum ReportDispatchOutcome {
    OrderNotFound,
    /// The order is not waiting for an operator (already completed or not
    /// even paid). No mutation.
    NotAwaitingReport,
    /// Store failure; nothing dispatched.
    Failed,
    Dispatched {
        order: Order,
        /// Telegram id of the order's owner, when resolvable, so the
        /// handler can tell the customer their deliverable is on its way.
        recipient_tg_id: Option<i64>,
    },
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn OrderStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Pure read: the orders an operator still owes a deliverable.
    pub async fn list_pending_orders(&self) -> Result<Vec<Order>> {
        self.store.list_pending_orders().await
    }

    /// Record the report dispatch for an order. The file itself travels
    /// through a caption-keyed side channel; here only the status advance
    /// and the audit record happen.
    pub async fn dispatch_report(&self, order_id: i64) -> ReportDispatchOutcome {
        let order = match self.store.get_order_by_id(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return ReportDispatchOutcome::OrderNotFound,
            Err(e) => {
                warn!("Order lookup failed for report dispatch #{order_id}: {e:#}");
                return ReportDispatchOutcome::Failed;
            }
        };

        if !order.status.awaits_operator() {
            return ReportDispatchOutcome::NotAwaitingReport;
        }

        if let Err(e) = self
            .store
            .update_order_status(order_id, OrderStatus::Completed)
            .await
        {
            warn!("Report dispatch failed to complete order #{order_id}: {e:#}");
            return ReportDispatchOutcome::Failed;
        }

        self.store
            .log_event(
                Some(order.user_id),
                "report_dispatched",
                &format!("order={order_id}"),
            )
            .await;
        info!("Report dispatched for order #{order_id}");

        let recipient_tg_id = match self.store.get_user(order.user_id).await {
            Ok(Some(user)) => Some(user.tg_id),
            Ok(None) => None,
            Err(e) => {
                warn!("Owner lookup failed for order #{order_id}: {e:#}");
                None
            }
        };

        ReportDispatchOutcome::Dispatched {
            order,
            recipient_tg_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::MockStore;
    use kopilka_db::models::store::ServiceType;

    #[tokio::test]
    async fn dispatch_completes_pending_order() {
        let store = Arc::new(MockStore::new());
        let user = store.seed_user(100, false).await;
        let order_id = store.seed_order(user.id, ServiceType::Detox, OrderStatus::FormSent, "pay_1");

        let svc = AdminService::new(store.clone());
        let outcome = svc.dispatch_report(order_id).await;

        match outcome {
            ReportDispatchOutcome::Dispatched {
                recipient_tg_id, ..
            } => assert_eq!(recipient_tg_id, Some(100)),
            other => panic!("expected Dispatched, got {other:?}"),
        }
        assert_eq!(store.order(order_id).status, OrderStatus::Completed);
        assert!(store.has_event("report_dispatched"));
    }

    #[tokio::test]
    async fn completed_order_cannot_be_dispatched_twice() {
        let store = Arc::new(MockStore::new());
        let user = store.seed_user(100, false).await;
        let order_id =
            store.seed_order(user.id, ServiceType::Detox, OrderStatus::Completed, "pay_1");

        let svc = AdminService::new(store.clone());
        let outcome = svc.dispatch_report(order_id).await;

        assert!(matches!(outcome, ReportDispatchOutcome::NotAwaitingReport));
    }

    #[tokio::test]
    async fn unknown_order_reports_not_found() {
        let store = Arc::new(MockStore::new());
        let svc = AdminService::new(store);
        assert!(matches!(
            svc.dispatch_report(404).await,
            ReportDispatchOutcome::OrderNotFound
        ));
    }

    #[tokio::test]
    async fn pending_listing_returns_operator_queue() {
        let store = Arc::new(MockStore::new());
        let user = store.seed_user(100, false).await;
        store.seed_order(user.id, ServiceType::Detox, OrderStatus::FormSent, "pay_1");

        let svc = AdminService::new(store.clone());
        let pending = svc.list_pending_orders().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, OrderStatus::FormSent);
    }
}
