use std::sync::Arc;

use kopilka_db::models::store::{ServiceType, User};
use kopilka_db::repositories::order_repo::CreateOrderError;
use tracing::{error, info, warn};

use crate::gateway::PaymentGateway;
use crate::store::{NewOrder, OrderStore};

/// Every variant maps to exactly one user-facing message in the callback
/// handler; the flow itself never talks to Telegram.
#[derive(Debug)]
pub enum CreateOrderOutcome {
    Created {
        order_id: i64,
        gateway_payment_id: String,
        payment_url: String,
        service: ServiceType,
        price: i64,
    },
    /// The user already has an order in an active status. No gateway call
    /// is made on this path.
    AlreadyActive,
    /// Payment could not be created on the gateway. Nothing was written
    /// anywhere, safe to retry.
    GatewayUnavailable,
    /// The store failed before any mutation (pre-check read). Retryable.
    StoreUnavailable,
    /// The gateway payment exists but the order transaction failed: the
    /// one reconcilable inconsistency of this flow. The orphaned gateway
    /// payment id is logged for manual reconciliation; the gateway side is
    /// deliberately not cancelled.
    OrphanedPayment,
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Sell `service` to `user`. The store transaction is the only mutation
    /// point: every failure before it leaves no local state behind, and a
    /// failure after the gateway call is surfaced as `OrphanedPayment`.
    pub async fn create_order(
        &self,
        user: &User,
        service: ServiceType,
        form_url: Option<&str>,
    ) -> CreateOrderOutcome {
        // Fast-path duplicate check. The partial unique index is the
        // authoritative guard; this read just avoids a wasted gateway call.
        let active = match self.store.get_active_orders(user.id).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!("Active-order pre-check failed for user {}: {e:#}", user.id);
                return CreateOrderOutcome::StoreUnavailable;
            }
        };
        if !active.is_empty() {
            info!(
                "User {} already has an active order (#{}), refusing new {}",
                user.id,
                active[0].id,
                service.as_str()
            );
            return CreateOrderOutcome::AlreadyActive;
        }

        let price = service.price_minor();
        let description = format!("Оплата: {}", service.display_name());
        let created = match self.gateway.create_payment(price, &description).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Gateway payment creation failed for user {}: {e:#}", user.id);
                return CreateOrderOutcome::GatewayUnavailable;
            }
        };

        let new_order = NewOrder {
            user_id: user.id,
            service,
            price,
            form_url,
            gateway_payment_id: &created.payment_id,
            payment_url: &created.confirmation_url,
        };
        match self.store.create_order_with_payment(new_order).await {
            Ok(ids) => {
                info!(
                    "Order #{} created for user {} ({}, payment {})",
                    ids.order_id,
                    user.id,
                    service.as_str(),
                    created.payment_id
                );
                self.store
                    .log_event(
                        Some(user.id),
                        "order_created",
                        &format!("order={} service={}", ids.order_id, service.as_str()),
                    )
                    .await;
                CreateOrderOutcome::Created {
                    order_id: ids.order_id,
                    gateway_payment_id: created.payment_id,
                    payment_url: created.confirmation_url,
                    service,
                    price,
                }
            }
            Err(CreateOrderError::DuplicateActiveOrder) => {
                // Lost the race against a concurrent creation. The gateway
                // payment for this attempt is orphaned but harmless: it is
                // never confirmed and expires on the gateway side.
                warn!(
                    "Concurrent order creation for user {}; gateway payment {} abandoned",
                    user.id, created.payment_id
                );
                CreateOrderOutcome::AlreadyActive
            }
            Err(CreateOrderError::Db(e)) => {
                error!(
                    "Order transaction failed for user {} after gateway payment {} was created: {e:#}. \
                     Manual reconciliation required.",
                    user.id, created.payment_id
                );
                self.store
                    .log_event(
                        Some(user.id),
                        "order_create_orphan",
                        &format!("gateway_payment={}", created.payment_id),
                    )
                    .await;
                CreateOrderOutcome::OrphanedPayment
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockGateway, MockStore};
    use kopilka_db::models::store::{OrderStatus, PaymentStatus};

    fn service_under_test(
        store: Arc<MockStore>,
        gateway: Arc<MockGateway>,
    ) -> OrderService {
        OrderService::new(store, gateway)
    }

    #[tokio::test]
    async fn creates_order_and_payment_with_matching_ids() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());
        let user = store.seed_user(100, false).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.create_order(&user, ServiceType::Modeling, None).await;

        let (order_id, gw_id) = match outcome {
            CreateOrderOutcome::Created {
                order_id,
                gateway_payment_id,
                price,
                ..
            } => {
                assert_eq!(price, 35000);
                (order_id, gateway_payment_id)
            }
            other => panic!("expected Created, got {other:?}"),
        };

        let order = store.order(order_id);
        assert_eq!(order.status, OrderStatus::PaymentPending);
        let payment = store.payment_for_order(order_id);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.gateway_payment_id, gw_id);
        assert_eq!(gateway.create_calls(), 1);
    }

    #[tokio::test]
    async fn active_order_blocks_creation_without_gateway_call() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::paid());
        let user = store.seed_user(100, false).await;
        store.seed_order(user.id, ServiceType::Detox, OrderStatus::Processing, "pay_old");

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.create_order(&user, ServiceType::Detox, None).await;

        assert!(matches!(outcome, CreateOrderOutcome::AlreadyActive));
        assert_eq!(gateway.create_calls(), 0);
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_writes_nothing() {
        let store = Arc::new(MockStore::new());
        let gateway = Arc::new(MockGateway::failing_create());
        let user = store.seed_user(100, false).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.create_order(&user, ServiceType::Detox, None).await;

        assert!(matches!(outcome, CreateOrderOutcome::GatewayUnavailable));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_after_gateway_reports_orphan() {
        let store = Arc::new(MockStore::new());
        store.fail_create_order();
        let gateway = Arc::new(MockGateway::paid());
        let user = store.seed_user(100, false).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.create_order(&user, ServiceType::Modeling, None).await;

        assert!(matches!(outcome, CreateOrderOutcome::OrphanedPayment));
        assert_eq!(gateway.create_calls(), 1);
        assert_eq!(store.order_count(), 0);
        assert!(store.has_event("order_create_orphan"));
    }

    #[tokio::test]
    async fn racing_duplicate_maps_to_already_active() {
        let store = Arc::new(MockStore::new());
        store.conflict_on_create_order();
        let gateway = Arc::new(MockGateway::paid());
        let user = store.seed_user(100, false).await;

        let svc = service_under_test(store.clone(), gateway.clone());
        let outcome = svc.create_order(&user, ServiceType::Detox, None).await;

        assert!(matches!(outcome, CreateOrderOutcome::AlreadyActive));
        assert_eq!(store.order_count(), 0);
    }
}
