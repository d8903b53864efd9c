//! In-memory doubles for the store and gateway ports, with failure
//! injection for the partial-write paths the flows must survive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use kopilka_db::models::store::{Order, OrderStatus, Payment, PaymentStatus, ServiceType, User};
use kopilka_db::repositories::order_repo::{CreateOrderError, CreatedOrder};

use crate::gateway::{CreatedPayment, GatewayPaymentStatus, PaymentGateway};
use crate::store::{NewOrder, OrderStore};

#[derive(Default)]
struct StoreState {
    users: Vec<User>,
    orders: Vec<Order>,
    payments: Vec<Payment>,
    events: Vec<String>,
    fail_order_update_to: Vec<OrderStatus>,
    succeeded_transitions: usize,
}

pub struct MockStore {
    state: Mutex<StoreState>,
    fail_create: AtomicBool,
    conflict_create: AtomicBool,
    fail_mark_succeeded: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            fail_create: AtomicBool::new(false),
            conflict_create: AtomicBool::new(false),
            fail_mark_succeeded: AtomicBool::new(false),
        }
    }

    pub fn fail_create_order(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn conflict_on_create_order(&self) {
        self.conflict_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_mark_succeeded(&self) {
        self.fail_mark_succeeded.store(true, Ordering::SeqCst);
    }

    pub fn fail_order_update_to(&self, status: OrderStatus) {
        self.state
            .lock()
            .unwrap()
            .fail_order_update_to
            .push(status);
    }

    pub async fn seed_user(&self, tg_id: i64, is_admin: bool) -> User {
        let mut state = self.state.lock().unwrap();
        let user = User {
            id: state.users.len() as i64 + 1,
            tg_id,
            username: None,
            full_name: Some("Test User".to_string()),
            is_admin,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        user
    }

    pub fn seed_order(
        &self,
        user_id: i64,
        service: ServiceType,
        status: OrderStatus,
        gateway_payment_id: &str,
    ) -> i64 {
        let mut state = self.state.lock().unwrap();
        let order_id = state.orders.len() as i64 + 1;
        let payment_id = state.payments.len() as i64 + 1;
        state.orders.push(Order {
            id: order_id,
            user_id,
            service,
            price: service.price_minor(),
            form_url: match service {
                ServiceType::Detox => Some("https://forms.example/detox".to_string()),
                ServiceType::Modeling => None,
            },
            status,
            created_at: Utc::now(),
        });
        state.payments.push(Payment {
            id: payment_id,
            order_id,
            gateway_payment_id: gateway_payment_id.to_string(),
            payment_url: "https://pay.example/checkout".to_string(),
            status: PaymentStatus::Pending,
            amount: service.price_minor(),
            created_at: Utc::now(),
        });
        order_id
    }

    pub fn order(&self, order_id: i64) -> Order {
        self.state
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .expect("order not seeded")
    }

    pub fn payment_for_order(&self, order_id: i64) -> Payment {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned()
            .expect("payment not seeded")
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    pub fn succeeded_transitions(&self) -> usize {
        self.state.lock().unwrap().succeeded_transitions
    }

    pub fn has_event(&self, action: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .any(|e| e == action)
    }
}

#[async_trait]
impl OrderStore for MockStore {
    async fn upsert_user(
        &self,
        tg_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        grant_admin: bool,
    ) -> Result<User> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.tg_id == tg_id) {
            if let Some(username) = username {
                user.username = Some(username.to_string());
            }
            if let Some(full_name) = full_name {
                user.full_name = Some(full_name.to_string());
            }
            user.is_admin |= grant_admin;
            return Ok(user.clone());
        }
        let user = User {
            id: state.users.len() as i64 + 1,
            tg_id,
            username: username.map(str::to_string),
            full_name: full_name.map(str::to_string),
            is_admin: grant_admin,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn get_active_orders(&self, user_id: i64) -> Result<Vec<Order>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && o.status.is_active())
            .cloned()
            .collect())
    }

    async fn create_order_with_payment(
        &self,
        order: NewOrder<'_>,
    ) -> Result<CreatedOrder, CreateOrderError> {
        if self.conflict_create.load(Ordering::SeqCst) {
            return Err(CreateOrderError::DuplicateActiveOrder);
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CreateOrderError::Db(anyhow::anyhow!(
                "injected store failure"
            )));
        }
        let mut state = self.state.lock().unwrap();
        let order_id = state.orders.len() as i64 + 1;
        let payment_id = state.payments.len() as i64 + 1;
        state.orders.push(Order {
            id: order_id,
            user_id: order.user_id,
            service: order.service,
            price: order.price,
            form_url: order.form_url.map(str::to_string),
            status: OrderStatus::PaymentPending,
            created_at: Utc::now(),
        });
        state.payments.push(Payment {
            id: payment_id,
            order_id,
            gateway_payment_id: order.gateway_payment_id.to_string(),
            payment_url: order.payment_url.to_string(),
            status: PaymentStatus::Pending,
            amount: order.price,
            created_at: Utc::now(),
        });
        Ok(CreatedOrder {
            order_id,
            payment_id,
        })
    }

    async fn get_order_by_id(&self, order_id: i64) -> Result<Option<Order>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_order_update_to.contains(&status) {
            return Err(anyhow::anyhow!("injected order-status failure"));
        }
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| anyhow::anyhow!("Order {order_id} not found"))?;
        order.status = status;
        Ok(())
    }

    async fn get_payment_by_order_id(&self, order_id: i64) -> Result<Option<Payment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn update_payment_status(&self, payment_id: i64, status: PaymentStatus) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| anyhow::anyhow!("Payment {payment_id} not found"))?;
        payment.status = status;
        Ok(())
    }

    async fn mark_payment_succeeded(&self, payment_id: i64) -> Result<bool> {
        if self.fail_mark_succeeded.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("injected payment-status failure"));
        }
        let mut state = self.state.lock().unwrap();
        let payment = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or_else(|| anyhow::anyhow!("Payment {payment_id} not found"))?;
        if payment.status != PaymentStatus::Pending {
            return Ok(false);
        }
        payment.status = PaymentStatus::Succeeded;
        state.succeeded_transitions += 1;
        Ok(true)
    }

    async fn list_pending_orders(&self) -> Result<Vec<Order>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .orders
            .iter()
            .filter(|o| o.status.awaits_operator())
            .cloned()
            .collect())
    }

    async fn log_event(&self, _user_id: Option<i64>, action: &str, _details: &str) {
        self.state.lock().unwrap().events.push(action.to_string());
    }
}

pub struct MockGateway {
    paid: bool,
    fail_create: bool,
    fail_status: bool,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockGateway {
    pub fn paid() -> Self {
        Self {
            paid: true,
            fail_create: false,
            fail_status: false,
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn unpaid() -> Self {
        Self {
            paid: false,
            ..Self::paid()
        }
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::paid()
        }
    }

    pub fn failing_status() -> Self {
        Self {
            fail_status: true,
            ..Self::paid()
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment(
        &self,
        _amount_minor: i64,
        _description: &str,
    ) -> Result<CreatedPayment> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create {
            return Err(anyhow::anyhow!("injected gateway failure"));
        }
        Ok(CreatedPayment {
            payment_id: format!("pay_mock_{n}"),
            confirmation_url: format!("https://pay.example/checkout/{n}"),
        })
    }

    async fn payment_status(&self, payment_id: &str) -> Result<GatewayPaymentStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status {
            return Err(anyhow::anyhow!("injected gateway failure"));
        }
        let _ = payment_id;
        Ok(GatewayPaymentStatus {
            paid: self.paid,
            status: if self.paid { "succeeded" } else { "pending" }.to_string(),
            amount_minor: Some(35000),
        })
    }
}
