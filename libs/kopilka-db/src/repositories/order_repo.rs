use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use thiserror::Error;

use crate::models::store::{Order, OrderStatus, ServiceType};

/// Creation can fail in two materially different ways: the partial unique
/// index rejecting a second active order for the same user, or an ordinary
/// database failure. Callers treat these differently.
#[derive(Debug, Error)]
pub enum CreateOrderError {
    #[error("user already has an active order")]
    DuplicateActiveOrder,
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct CreatedOrder {
    pub order_id: i64,
    pub payment_id: i64,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let service: String = row.try_get("service")?;
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            service: ServiceType::parse(&service)
                .ok_or_else(|| anyhow::anyhow!("Unknown service type in orders row: {service}"))?,
            price: row.try_get("price")?,
            form_url: row.try_get("form_url")?,
            status: OrderStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("Unknown order status in orders row: {status}"))?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order by ID")?;
        row.map(|r| Self::row_to_order(&r)).transpose()
    }

    pub async fn get_active_for_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE user_id = $1 AND status <> 'completed' ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active orders")?;
        rows.iter().map(Self::row_to_order).collect()
    }

    /// The single mutation point of order creation: order row, payment row
    /// and the initial statuses land in one transaction or not at all.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_with_payment(
        &self,
        user_id: i64,
        service: ServiceType,
        price: i64,
        form_url: Option<&str>,
        gateway_payment_id: &str,
        payment_url: &str,
    ) -> Result<CreatedOrder, CreateOrderError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open transaction")?;

        let order_res = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO orders (user_id, service, price, form_url, status)
            VALUES ($1, $2, $3, $4, 'payment_pending')
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(service.as_str())
        .bind(price)
        .bind(form_url)
        .fetch_one(&mut *tx)
        .await;

        let order_id = match order_res {
            Ok(id) => id,
            Err(e) => {
                if e.as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false)
                {
                    return Err(CreateOrderError::DuplicateActiveOrder);
                }
                return Err(anyhow::Error::from(e)
                    .context("Failed to insert order")
                    .into());
            }
        };

        let payment_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (order_id, gateway_payment_id, payment_url, status, amount)
            VALUES ($1, $2, $3, 'pending', $4)
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(gateway_payment_id)
        .bind(payment_url)
        .bind(price)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert payment")?;

        tx.commit().await.context("Failed to commit order")?;

        Ok(CreatedOrder {
            order_id,
            payment_id,
        })
    }

    pub async fn update_status(&self, order_id: i64, status: OrderStatus) -> Result<()> {
        let res = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await
            .context("Failed to update order status")?;
        if res.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Order {order_id} not found"));
        }
        Ok(())
    }

    /// Orders waiting for the operator to dispatch a deliverable.
    pub async fn list_pending(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE status IN ('form_sent', 'processing') ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending orders")?;
        rows.iter().map(Self::row_to_order).collect()
    }
}
