use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub tg_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// The two paid services the bot sells. Prices are fixed and expressed in
/// minor units (kopecks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    Detox,
    Modeling,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Detox => "detox",
            ServiceType::Modeling => "modeling",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "detox" => Some(ServiceType::Detox),
            "modeling" => Some(ServiceType::Modeling),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ServiceType::Detox => "Финансовый детокс",
            ServiceType::Modeling => "Финансовое моделирование",
        }
    }

    pub fn price_minor(&self) -> i64 {
        match self {
            ServiceType::Detox => 450_00,
            ServiceType::Modeling => 350_00,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    PaymentPending,
    PaymentConfirmed,
    FormSent,
    Processing,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::PaymentConfirmed => "payment_confirmed",
            OrderStatus::FormSent => "form_sent",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(OrderStatus::Created),
            "payment_pending" => Some(OrderStatus::PaymentPending),
            "payment_confirmed" => Some(OrderStatus::PaymentConfirmed),
            "form_sent" => Some(OrderStatus::FormSent),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    /// An order in any of these statuses blocks creation of another one for
    /// the same user. Must stay in sync with the partial unique index in the
    /// initial migration.
    pub fn is_active(&self) -> bool {
        !matches!(self, OrderStatus::Completed)
    }

    /// Statuses the admin panel treats as "waiting for the operator".
    pub fn awaits_operator(&self) -> bool {
        matches!(self, OrderStatus::FormSent | OrderStatus::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub service: ServiceType,
    pub price: i64,
    pub form_url: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "canceled" => Some(PaymentStatus::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub gateway_payment_id: String,
    pub payment_url: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips() {
        for s in [
            OrderStatus::Created,
            OrderStatus::PaymentPending,
            OrderStatus::PaymentConfirmed,
            OrderStatus::FormSent,
            OrderStatus::Processing,
            OrderStatus::Completed,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }

    #[test]
    fn only_completed_is_inactive() {
        assert!(!OrderStatus::Completed.is_active());
        assert!(OrderStatus::Created.is_active());
        assert!(OrderStatus::FormSent.is_active());
        assert!(OrderStatus::Processing.is_active());
    }

    #[test]
    fn operator_queue_statuses() {
        assert!(OrderStatus::FormSent.awaits_operator());
        assert!(OrderStatus::Processing.awaits_operator());
        assert!(!OrderStatus::PaymentConfirmed.awaits_operator());
        assert!(!OrderStatus::Completed.awaits_operator());
    }

    #[test]
    fn service_prices_in_minor_units() {
        assert_eq!(ServiceType::Detox.price_minor(), 45000);
        assert_eq!(ServiceType::Modeling.price_minor(), 35000);
        assert_eq!(ServiceType::parse("detox"), Some(ServiceType::Detox));
        assert_eq!(ServiceType::parse("financial_detox"), None);
    }
}
