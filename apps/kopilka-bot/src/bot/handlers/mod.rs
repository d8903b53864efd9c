use kopilka_db::models::store::{ServiceType, User};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{error, warn};

use crate::agent::thread_id_for;
use crate::bot::keyboards;
use crate::bot::router::Action;
use crate::bot::utils::{format_rub, mini_app_url};
use crate::services::admin_service::ReportDispatchOutcome;
use crate::services::order_service::CreateOrderOutcome;
use crate::services::payment_service::ConfirmOutcome;
use crate::AppState;

pub mod callback;
pub mod command;

/// Execute one routed action and send exactly one message to the acting
/// user. Both the message and the callback handler funnel through here so
/// the action enum is matched in a single place.
pub async fn dispatch_action(
    bot: &Bot,
    state: &AppState,
    user: &User,
    chat_id: ChatId,
    action: Action,
    fallback_prompt: String,
) -> Result<(), teloxide::RequestError> {
    match action {
        Action::CreateOrder(service) => {
            let form_url = match service {
                ServiceType::Detox => Some(state.config.detox_form_url.as_str()),
                ServiceType::Modeling => None,
            };
            let outcome = state.orders.create_order(user, service, form_url).await;
            handle_create_outcome(bot, chat_id, outcome).await
        }

        Action::ConfirmPayment {
            order_id,
            payment_id,
        } => {
            let outcome = state.payments.confirm_payment(order_id, &payment_id).await;
            handle_confirm_outcome(bot, state, user, chat_id, outcome).await
        }

        Action::ShowAdminPanel => show_admin_panel(bot, state, chat_id).await,

        Action::SendReport { order_id } => {
            let outcome = state.admin.dispatch_report(order_id).await;
            handle_report_outcome(bot, chat_id, outcome).await
        }

        Action::Fallback => relay_to_agent(bot, state, user, chat_id, &fallback_prompt).await,
    }
}

async fn handle_create_outcome(
    bot: &Bot,
    chat_id: ChatId,
    outcome: CreateOrderOutcome,
) -> Result<(), teloxide::RequestError> {
    match outcome {
        CreateOrderOutcome::Created {
            order_id,
            gateway_payment_id,
            payment_url,
            service,
            price,
        } => {
            let text = format!(
                "💳 Заказ №{order_id} создан!\n\n\
                 Услуга: {}\n\
                 Сумма: {}₽\n\n\
                 👉 Оплатите по ссылке:\n{payment_url}\n\n\
                 После оплаты нажмите «Я оплатил».",
                service.display_name(),
                format_rub(price),
            );
            bot.send_message(chat_id, text)
                .reply_markup(keyboards::payment_keyboard(
                    order_id,
                    &gateway_payment_id,
                    &payment_url,
                ))
                .await?;
        }
        CreateOrderOutcome::AlreadyActive => {
            bot.send_message(
                chat_id,
                "⚠️ У вас уже есть активный заказ. Завершите его, прежде чем оформлять новый.",
            )
            .await?;
        }
        CreateOrderOutcome::GatewayUnavailable => {
            bot.send_message(chat_id, "❌ Не удалось создать платёж. Попробуйте позже.")
                .await?;
        }
        CreateOrderOutcome::StoreUnavailable | CreateOrderOutcome::OrphanedPayment => {
            bot.send_message(chat_id, "❌ Не удалось создать заказ. Попробуйте позже.")
                .await?;
        }
    }
    Ok(())
}

async fn handle_confirm_outcome(
    bot: &Bot,
    state: &AppState,
    user: &User,
    chat_id: ChatId,
    outcome: ConfirmOutcome,
) -> Result<(), teloxide::RequestError> {
    match outcome {
        ConfirmOutcome::Confirmed { order } => match order.service {
            ServiceType::Detox => {
                let form_url = order
                    .form_url
                    .unwrap_or_else(|| state.config.detox_form_url.clone());
                bot.send_message(
                    chat_id,
                    format!("✅ Оплата подтверждена!\n\n📝 Заполните анкету:\n{form_url}"),
                )
                .await?;
            }
            ServiceType::Modeling => {
                let url = mini_app_url(&state.config.host_url, user.tg_id, order.id);
                let text = "✅ Оплата подтверждена!\n\n📊 Доступ к финансовому моделированию открыт.";
                match keyboards::mini_app_keyboard(&url) {
                    Some(kb) => {
                        bot.send_message(chat_id, text).reply_markup(kb).await?;
                    }
                    None => {
                        // Host URL not web-app compatible; fall back to a
                        // plain link.
                        bot.send_message(chat_id, format!("{text}\n\n{url}")).await?;
                    }
                }
            }
        },
        ConfirmOutcome::OrderNotFound => {
            bot.send_message(chat_id, "❌ Заказ не найден.").await?;
        }
        ConfirmOutcome::TokenMismatch => {
            bot.send_message(
                chat_id,
                "❌ Данные платежа не совпадают с заказом. Обратитесь в поддержку.",
            )
            .await?;
        }
        ConfirmOutcome::AlreadyConfirmed => {
            bot.send_message(chat_id, "✅ Оплата уже подтверждена.").await?;
        }
        ConfirmOutcome::NotPaidYet => {
            bot.send_message(
                chat_id,
                "❌ Оплата ещё не подтверждена. Попробуйте позже.",
            )
            .await?;
        }
        ConfirmOutcome::Unavailable => {
            bot.send_message(chat_id, "⚠️ Сервис временно недоступен. Попробуйте позже.")
                .await?;
        }
        ConfirmOutcome::OrderUpdateFailed | ConfirmOutcome::RolledBack => {
            bot.send_message(
                chat_id,
                "⚠️ Не удалось обработать платёж. Нажмите «Я оплатил» ещё раз.",
            )
            .await?;
        }
        ConfirmOutcome::CriticalInconsistency { incident_code } => {
            bot.send_message(
                chat_id,
                format!(
                    "🚨 Произошла ошибка при обработке платежа. Обратитесь в поддержку и назовите \
                     код инцидента: {incident_code}"
                ),
            )
            .await?;
        }
        ConfirmOutcome::FinalizeFailed => {
            bot.send_message(
                chat_id,
                "⚠️ Оплата получена, но заказ не удалось завершить. Обратитесь в поддержку.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn show_admin_panel(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
) -> Result<(), teloxide::RequestError> {
    let orders = match state.admin.list_pending_orders().await {
        Ok(orders) => orders,
        Err(e) => {
            warn!("Admin panel listing failed: {e:#}");
            bot.send_message(chat_id, "⚠️ Не удалось получить список заказов.")
                .await?;
            return Ok(());
        }
    };

    if orders.is_empty() {
        bot.send_message(chat_id, "📭 Нет заказов для обработки.").await?;
        return Ok(());
    }

    bot.send_message(
        chat_id,
        "📋 <b>Панель администратора</b>\n\nЗаказы, ожидающие отправки отчёта:",
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboards::admin_panel_keyboard(&orders))
    .await?;
    Ok(())
}

async fn handle_report_outcome(
    bot: &Bot,
    chat_id: ChatId,
    outcome: ReportDispatchOutcome,
) -> Result<(), teloxide::RequestError> {
    match outcome {
        ReportDispatchOutcome::Dispatched {
            order,
            recipient_tg_id,
        } => {
            bot.send_message(
                chat_id,
                format!("✅ Отчёт для заказа #{} отправлен клиенту.", order.id),
            )
            .await?;
            // Best-effort heads-up for the customer; the admin already got
            // the authoritative confirmation above.
            if let Some(tg_id) = recipient_tg_id {
                if let Err(e) = bot
                    .send_message(
                        ChatId(tg_id),
                        format!("📄 Отчёт по вашему заказу №{} готов и отправлен!", order.id),
                    )
                    .await
                {
                    warn!("Failed to notify order #{} owner: {e}", order.id);
                }
            }
        }
        ReportDispatchOutcome::OrderNotFound => {
            bot.send_message(chat_id, "❌ Заказ не найден.").await?;
        }
        ReportDispatchOutcome::NotAwaitingReport => {
            bot.send_message(chat_id, "⚠️ Этот заказ не ожидает отчёта.").await?;
        }
        ReportDispatchOutcome::Failed => {
            bot.send_message(chat_id, "❌ Ошибка отправки отчёта. Попробуйте позже.")
                .await?;
        }
    }
    Ok(())
}

async fn relay_to_agent(
    bot: &Bot,
    state: &AppState,
    user: &User,
    chat_id: ChatId,
    prompt: &str,
) -> Result<(), teloxide::RequestError> {
    match state
        .agent
        .generate(prompt, &thread_id_for(user.tg_id))
        .await
    {
        Ok(reply) => {
            bot.send_message(chat_id, reply).await?;
        }
        Err(e) => {
            error!("Agent fallback failed for user {}: {e:#}", user.tg_id);
            bot.send_message(chat_id, "❌ Произошла ошибка. Попробуйте позже.")
                .await?;
        }
    }
    Ok(())
}
