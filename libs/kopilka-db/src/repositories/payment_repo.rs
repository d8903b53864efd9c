use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::store::{Payment, PaymentStatus};

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;
        Ok(Payment {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            gateway_payment_id: row.try_get("gateway_payment_id")?,
            payment_url: row.try_get("payment_url")?,
            status: PaymentStatus::parse(&status).ok_or_else(|| {
                anyhow::anyhow!("Unknown payment status in payments row: {status}")
            })?,
            amount: row.try_get("amount")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    pub async fn get_by_order_id(&self, order_id: i64) -> Result<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch payment by order ID")?;
        row.map(|r| Self::row_to_payment(&r)).transpose()
    }

    pub async fn update_status(&self, payment_id: i64, status: PaymentStatus) -> Result<()> {
        let res = sqlx::query("UPDATE payments SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .context("Failed to update payment status")?;
        if res.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Payment {payment_id} not found"));
        }
        Ok(())
    }

    /// The replay guard. The conditional WHERE makes the pending → succeeded
    /// transition happen at most once; of two racing confirmations only one
    /// sees `true`.
    pub async fn mark_succeeded(&self, payment_id: i64) -> Result<bool> {
        let res = sqlx::query("UPDATE payments SET status = 'succeeded' WHERE id = $1 AND status = 'pending'")
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark payment succeeded")?;
        Ok(res.rows_affected() == 1)
    }
}
