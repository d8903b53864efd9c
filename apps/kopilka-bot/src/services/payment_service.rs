use std::sync::Arc;

use kopilka_db::models::store::{Order, OrderStatus, PaymentStatus, ServiceType};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gateway::PaymentGateway;
use crate::store::OrderStore;

/// Outcome of one confirmation attempt. Exactly one user-facing message per
/// variant; the handler does the wording.
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// Unknown order id. No mutation.
    OrderNotFound,
    /// Payment row missing or its gateway id differs from the one embedded
    /// in the button token (forged or stale token). No mutation.
    TokenMismatch,
    /// Replay guard: the payment is already succeeded. No mutation.
    AlreadyConfirmed,
    /// The gateway does not report the payment as paid yet. No mutation;
    /// the user can press the button again later.
    NotPaidYet,
    /// A read against the store or gateway failed before any mutation.
    Unavailable,
    /// The order-status write failed; the payment row is untouched, so a
    /// retry starts from a consistent state.
    OrderUpdateFailed,
    /// The payment-status write failed and the compensating rollback
    /// restored the order; the user should retry.
    RolledBack,
    /// The payment-status write failed AND the rollback failed: order stuck
    /// at payment_confirmed with the payment still pending. Operator-level
    /// incident, never retried automatically.
    CriticalInconsistency { incident_code: String },
    /// Payment durably succeeded, but the final service-specific status
    /// advance failed. Lesser inconsistency: money state is correct.
    FinalizeFailed,
    Confirmed { order: Order },
}

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn OrderStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Reconcile gateway truth with the store for one `payment_<o>_<p>`
    /// token. Invariant: the order status moves before the payment status,
    /// keeping the replay guard as the last write; a failure between the
    /// two writes is recoverable by rolling the order back.
    pub async fn confirm_payment(&self, order_id: i64, token_payment_id: &str) -> ConfirmOutcome {
        let order = match self.store.get_order_by_id(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return ConfirmOutcome::OrderNotFound,
            Err(e) => {
                warn!("Order lookup failed for #{order_id}: {e:#}");
                return ConfirmOutcome::Unavailable;
            }
        };

        let payment = match self.store.get_payment_by_order_id(order_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                warn!("Order #{order_id} has no payment row; rejecting token");
                return ConfirmOutcome::TokenMismatch;
            }
            Err(e) => {
                warn!("Payment lookup failed for order #{order_id}: {e:#}");
                return ConfirmOutcome::Unavailable;
            }
        };

        if payment.gateway_payment_id != token_payment_id {
            warn!(
                "Token payment id {token_payment_id} does not match stored {} for order #{order_id}",
                payment.gateway_payment_id
            );
            return ConfirmOutcome::TokenMismatch;
        }

        if payment.status == PaymentStatus::Succeeded {
            return ConfirmOutcome::AlreadyConfirmed;
        }

        let gateway_state = match self
            .gateway
            .payment_status(&payment.gateway_payment_id)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!("Gateway status check failed for order #{order_id}: {e:#}");
                return ConfirmOutcome::Unavailable;
            }
        };
        if !gateway_state.paid {
            info!(
                "Order #{order_id}: gateway reports '{}', not paid yet",
                gateway_state.status
            );
            return ConfirmOutcome::NotPaidYet;
        }

        if let Err(e) = self
            .store
            .update_order_status(order_id, OrderStatus::PaymentConfirmed)
            .await
        {
            warn!("Order #{order_id}: status advance to payment_confirmed failed: {e:#}");
            return ConfirmOutcome::OrderUpdateFailed;
        }

        match self.store.mark_payment_succeeded(payment.id).await {
            Ok(true) => {}
            Ok(false) => {
                // A concurrent confirmation won the conditional update.
                return ConfirmOutcome::AlreadyConfirmed;
            }
            Err(e) => {
                warn!("Order #{order_id}: payment-status write failed: {e:#}");
                return self.rollback_order(&order).await;
            }
        }

        self.store
            .log_event(
                Some(order.user_id),
                "payment_confirmed",
                &format!("order={} payment={}", order_id, payment.gateway_payment_id),
            )
            .await;

        let final_status = match order.service {
            ServiceType::Detox => OrderStatus::FormSent,
            ServiceType::Modeling => OrderStatus::Completed,
        };
        if let Err(e) = self.store.update_order_status(order_id, final_status).await {
            error!(
                "Order #{order_id}: payment succeeded but advance to {} failed: {e:#}",
                final_status.as_str()
            );
            return ConfirmOutcome::FinalizeFailed;
        }

        info!(
            "Order #{order_id} confirmed ({} → {})",
            order.service.as_str(),
            final_status.as_str()
        );
        ConfirmOutcome::Confirmed { order }
    }

    /// Compensating action for a failed payment-status write: put the order
    /// back to payment_pending so the whole confirmation can be retried.
    async fn rollback_order(&self, order: &Order) -> ConfirmOutcome {
        match self
            .store
            .update_order_status(order.id, OrderStatus::PaymentPending)
            .await
        {
            Ok(()) => {
                warn!("Order #{}: rolled back to payment_pending", order.id);
                ConfirmOutcome::RolledBack
            }
            Err(e) => {
                let incident_code = format!(
                    "PAY-{}-{}",
                    order.id,
                    &Uuid::new_v4().simple().to_string()[..8]
                );
                error!(
                    "INCIDENT {incident_code}: order #{} stuck at payment_confirmed with payment \
                     still pending; rollback failed: {e:#}",
                    order.id
                );
                self.store
                    .log_event(
                        Some(order.user_id),
                        "payment_incident",
                        &format!("incident={incident_code} order={}", order.id),
                    )
                    .await;
                ConfirmOutcome::CriticalInconsistency { incident_code }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockGateway, MockStore};

    fn service_under_test(store: Arc<MockStore>, gateway: Arc<MockGateway>) -> PaymentService {
        PaymentService::new(store, gateway)
    }

    async fn seeded_order(
        store: &Arc<MockStore>,
        service: ServiceType,
        status: OrderStatus,
    ) -> i64 {
        let user = store.seed_user(100, false).await;
        store.seed_order(user.id, service, status, "pay_1")
    }

    #[tokio::test]
    async fn modeling_confirmation_completes_order() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Modeling, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        match outcome {
            ConfirmOutcome::Confirmed { order } => assert_eq!(order.service, ServiceType::Modeling),
            other => panic!("expected Confirmed, got {other:?}"),
        }
        assert_eq!(store.order(order_id).status, OrderStatus::Completed);
        assert_eq!(
            store.payment_for_order(order_id).status,
            PaymentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn detox_confirmation_sends_form() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Detox, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        assert!(matches!(outcome, ConfirmOutcome::Confirmed { .. }));
        assert_eq!(store.order(order_id).status, OrderStatus::FormSent);
    }

    #[tokio::test]
    async fn second_confirmation_is_a_noop() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Modeling, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let first = svc.confirm_payment(order_id, "pay_1").await;
        assert!(matches!(first, ConfirmOutcome::Confirmed { .. }));
        let transitions_after_first = store.succeeded_transitions();

        let second = svc.confirm_payment(order_id, "pay_1").await;
        assert!(matches!(second, ConfirmOutcome::AlreadyConfirmed));
        assert_eq!(store.succeeded_transitions(), transitions_after_first);
        assert_eq!(store.succeeded_transitions(), 1);
        assert_eq!(store.order(order_id).status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_order_is_rejected() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());

        let svc = service_under_test(store.clone(), gateway);
        let outcome = svc.confirm_payment(999, "pay_1").await;

        assert!(matches!(outcome, ConfirmOutcome::OrderNotFound));
    }

    #[tokio::test]
    async fn forged_token_is_rejected_without_mutation() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Detox, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.confirm_payment(order_id, "pay_other").await;

        assert!(matches!(outcome, ConfirmOutcome::TokenMismatch));
        assert_eq!(store.order(order_id).status, OrderStatus::PaymentPending);
        assert_eq!(
            store.payment_for_order(order_id).status,
            PaymentStatus::Pending
        );
        assert_eq!(gateway.status_calls(), 0);
    }

    #[tokio::test]
    async fn unpaid_payment_mutates_nothing() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::unpaid());
        let order_id = seeded_order(&store, ServiceType::Detox, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway);
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        assert!(matches!(outcome, ConfirmOutcome::NotPaidYet));
        assert_eq!(store.order(order_id).status, OrderStatus::PaymentPending);
        assert_eq!(
            store.payment_for_order(order_id).status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn payment_write_failure_rolls_order_back() {
        let store = Arc::new(MockStore::new());
        store.fail_mark_succeeded();
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Modeling, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway);
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        assert!(matches!(outcome, ConfirmOutcome::RolledBack));
        assert_eq!(store.order(order_id).status, OrderStatus::PaymentPending);
        assert_eq!(
            store.payment_for_order(order_id).status,
            PaymentStatus::Pending
        );
    }

    #[tokio::test]
    async fn failed_rollback_is_a_critical_incident() {
        let store = Arc::new(MockStore::new());
        store.fail_mark_succeeded();
        store.fail_order_update_to(OrderStatus::PaymentPending);
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Modeling, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway);
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        let code = match outcome {
            ConfirmOutcome::CriticalInconsistency { incident_code } => incident_code,
            other => panic!("expected CriticalInconsistency, got {other:?}"),
        };
        assert!(code.starts_with(&format!("PAY-{order_id}-")));
        assert_eq!(store.order(order_id).status, OrderStatus::PaymentConfirmed);
        assert_eq!(
            store.payment_for_order(order_id).status,
            PaymentStatus::Pending
        );
        assert!(store.has_event("payment_incident"));
    }

    #[tokio::test]
    async fn finalize_failure_keeps_payment_succeeded() {
        let store = Arc::new(MockStore::new());
        store.fail_order_update_to(OrderStatus::FormSent);
        let gateway = Arc::new(MockGateway::paid());
        let order_id = seeded_order(&store, ServiceType::Detox, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway);
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        assert!(matches!(outcome, ConfirmOutcome::FinalizeFailed));
        assert_eq!(store.order(order_id).status, OrderStatus::PaymentConfirmed);
        assert_eq!(
            store.payment_for_order(order_id).status,
            PaymentStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn gateway_outage_is_retryable() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::failing_status());
        let order_id = seeded_order(&store, ServiceType::Detox, OrderStatus::PaymentPending).await;

        let svc = service_under_test(store.clone(), gateway);
        let outcome = svc.confirm_payment(order_id, "pay_1").await;

        assert!(matches!(outcome, ConfirmOutcome::Unavailable));
        assert_eq!(store.order(order_id).status, OrderStatus::PaymentPending);
    }
}
