use anyhow::Result;
use async_trait::async_trait;

pub mod yookassa;

pub use yookassa::YooKassaGateway;

/// Result of creating a payment on the gateway side. Both fields are
/// mandatory: a 2xx response missing either is treated as a failure, so no
/// order is ever persisted against a half-created payment.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub confirmation_url: String,
}

/// Live payment state as reported by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayPaymentStatus {
    pub paid: bool,
    pub status: String,
    pub amount_minor: Option<i64>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment for `amount_minor` (kopecks) and return its id and
    /// the URL the user completes the payment at.
    async fn create_payment(&self, amount_minor: i64, description: &str)
        -> Result<CreatedPayment>;

    /// Query the gateway for the current status of a payment.
    async fn payment_status(&self, payment_id: &str) -> Result<GatewayPaymentStatus>;
}
