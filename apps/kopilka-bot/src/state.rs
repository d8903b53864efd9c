use std::sync::Arc;

use crate::agent::AgentClient;
use crate::services::admin_service::AdminService;
use crate::services::order_service::OrderService;
use crate::services::payment_service::PaymentService;
use crate::store::OrderStore;

/// Static configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Public base URL serving the financial-modeling mini-app.
    pub host_url: String,
    /// Questionnaire link sent after a detox order is paid.
    pub detox_form_url: String,
    /// Telegram ids granted the admin flag on first contact.
    pub admin_tg_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub admin: AdminService,
    pub agent: AgentClient,
    pub config: Arc<BotConfig>,
}
