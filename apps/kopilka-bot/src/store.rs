use anyhow::Result;
use async_trait::async_trait;
use kopilka_db::models::store::{Order, OrderStatus, Payment, PaymentStatus, ServiceType, User};
use kopilka_db::repositories::activity_repo::ActivityRepository;
use kopilka_db::repositories::order_repo::{CreateOrderError, CreatedOrder, OrderRepository};
use kopilka_db::repositories::payment_repo::PaymentRepository;
use kopilka_db::repositories::user_repo::UserRepository;
use kopilka_db::sqlx::PgPool;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: i64,
    pub service: ServiceType,
    pub price: i64,
    pub form_url: Option<&'a str>,
    pub gateway_payment_id: &'a str,
    pub payment_url: &'a str,
}

/// Persistence port for the order/payment flows. Implemented by
/// `PgOrderStore` in production and by in-memory doubles in tests, so the
/// flows never touch a live database in unit tests.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn upsert_user(
        &self,
        tg_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        grant_admin: bool,
    ) -> Result<User>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    async fn get_active_orders(&self, user_id: i64) -> Result<Vec<Order>>;

    /// Atomic: the order row, its payment row and both initial statuses are
    /// written in one transaction or not at all.
    async fn create_order_with_payment(
        &self,
        order: NewOrder<'_>,
    ) -> Result<CreatedOrder, CreateOrderError>;

    async fn get_order_by_id(&self, order_id: i64) -> Result<Option<Order>>;

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<()>;

    async fn get_payment_by_order_id(&self, order_id: i64) -> Result<Option<Payment>>;

    async fn update_payment_status(&self, payment_id: i64, status: PaymentStatus) -> Result<()>;

    /// Conditional pending → succeeded transition. Returns `false` when the
    /// payment was already succeeded: of two racing confirmations exactly
    /// one gets `true`.
    async fn mark_payment_succeeded(&self, payment_id: i64) -> Result<bool>;

    async fn list_pending_orders(&self) -> Result<Vec<Order>>;

    /// Best-effort audit record; never fails the calling flow.
    async fn log_event(&self, user_id: Option<i64>, action: &str, details: &str);
}

#[derive(Clone)]
pub struct PgOrderStore {
    user_repo: UserRepository,
    order_repo: OrderRepository,
    payment_repo: PaymentRepository,
    activity_repo: ActivityRepository,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            order_repo: OrderRepository::new(pool.clone()),
            payment_repo: PaymentRepository::new(pool.clone()),
            activity_repo: ActivityRepository::new(pool),
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn upsert_user(
        &self,
        tg_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        grant_admin: bool,
    ) -> Result<User> {
        self.user_repo
            .upsert(tg_id, username, full_name, grant_admin)
            .await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.user_repo.get_by_id(user_id).await
    }

    async fn get_active_orders(&self, user_id: i64) -> Result<Vec<Order>> {
        self.order_repo.get_active_for_user(user_id).await
    }

    async fn create_order_with_payment(
        &self,
        order: NewOrder<'_>,
    ) -> Result<CreatedOrder, CreateOrderError> {
        self.order_repo
            .create_with_payment(
                order.user_id,
                order.service,
                order.price,
                order.form_url,
                order.gateway_payment_id,
                order.payment_url,
            )
            .await
    }

    async fn get_order_by_id(&self, order_id: i64) -> Result<Option<Order>> {
        self.order_repo.get_by_id(order_id).await
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<()> {
        self.order_repo.update_status(order_id, status).await
    }

    async fn get_payment_by_order_id(&self, order_id: i64) -> Result<Option<Payment>> {
        self.payment_repo.get_by_order_id(order_id).await
    }

    async fn update_payment_status(&self, payment_id: i64, status: PaymentStatus) -> Result<()> {
        self.payment_repo.update_status(payment_id, status).await
    }

    async fn mark_payment_succeeded(&self, payment_id: i64) -> Result<bool> {
        self.payment_repo.mark_succeeded(payment_id).await
    }

    async fn list_pending_orders(&self) -> Result<Vec<Order>> {
        self.order_repo.list_pending().await
    }

    async fn log_event(&self, user_id: Option<i64>, action: &str, details: &str) {
        if let Err(e) = self.activity_repo.log(user_id, action, details).await {
            warn!("Failed to write activity log ({action}): {e}");
        }
    }
}
