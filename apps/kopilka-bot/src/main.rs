use std::env;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod agent;
mod bot;
mod gateway;
mod services;
mod state;
mod store;

use crate::agent::AgentClient;
use crate::gateway::{PaymentGateway, YooKassaGateway};
use crate::services::admin_service::AdminService;
use crate::services::order_service::OrderService;
use crate::services::payment_service::PaymentService;
use crate::state::{AppState, BotConfig};
use crate::store::{OrderStore, PgOrderStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Kopilka bot...");

    let token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let shop_id = env::var("YOOKASSA_SHOP_ID").context("YOOKASSA_SHOP_ID is not set")?;
    let secret_key = env::var("YOOKASSA_SECRET_KEY").context("YOOKASSA_SECRET_KEY is not set")?;

    let host_url = env::var("HOST_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let return_url = env::var("YOOKASSA_RETURN_URL").unwrap_or_else(|_| host_url.clone());
    let detox_form_url = env::var("DETOX_FORM_URL")
        .unwrap_or_else(|_| "https://forms.yandex.ru/u/6912423849af471482e765d3".to_string());
    let agent_url =
        env::var("AGENT_API_URL").unwrap_or_else(|_| "http://localhost:5001".to_string());
    let agent_token = env::var("AGENT_API_TOKEN").unwrap_or_default();
    let admin_tg_ids: Vec<i64> = env::var("ADMIN_TG_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let pool = kopilka_db::init_db(&database_url).await?;

    let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(pool));
    let payment_gateway: Arc<dyn PaymentGateway> =
        Arc::new(YooKassaGateway::new(shop_id, secret_key, return_url)?);
    let agent = AgentClient::new(agent_url, agent_token)?;

    let state = AppState {
        store: store.clone(),
        orders: OrderService::new(store.clone(), payment_gateway.clone()),
        payments: PaymentService::new(store.clone(), payment_gateway),
        admin: AdminService::new(store),
        agent,
        config: Arc::new(BotConfig {
            host_url,
            detox_form_url,
            admin_tg_ids,
        }),
    };

    let bot = Bot::new(token);

    let (_tx, rx) = tokio::sync::broadcast::channel(1);

    bot::run_bot(bot, rx, state).await;
    Ok(())
}
