use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{error, info};

use crate::bot::handlers::dispatch_action;
use crate::bot::keyboards::main_menu;
use crate::bot::router::{route, UpdateKind};
use crate::bot::utils::escape_html;
use crate::AppState;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    info!("Received message from chat {}: {:?}", msg.chat.id, text);

    let from = msg.from.as_ref();
    let tg_id = from.map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0);
    let username = from.and_then(|u| u.username.as_deref());
    let full_name = from.map(|u| u.full_name());

    // Every contact passes through the idempotent upsert before anything
    // else happens.
    let grant_admin = state.config.admin_tg_ids.contains(&tg_id);
    let user = match state
        .store
        .upsert_user(tg_id, username, full_name.as_deref(), grant_admin)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            error!("User upsert failed for {tg_id}: {e:#}");
            bot.send_message(msg.chat.id, "⚠️ Сервис временно недоступен. Попробуйте позже.")
                .await?;
            return Ok(());
        }
    };

    if text.starts_with("/start") {
        let name = full_name.unwrap_or_else(|| "друг".to_string());
        let welcome = format!(
            "👋 <b>Привет, {}!</b>\n\n\
             Я помогу навести порядок в личных финансах.\n\n\
             Выберите услугу:",
            escape_html(&name)
        );
        bot.send_message(msg.chat.id, welcome)
            .parse_mode(ParseMode::Html)
            .reply_markup(main_menu())
            .await?;
        return Ok(());
    }

    let action = route(user.is_admin, UpdateKind::Text(text));
    let prompt = format!(
        "Пользователь написал: \"{text}\"\n\n\
         Контекст: chat_id={}, tg_id={}, username={}, имя={}",
        msg.chat.id.0,
        tg_id,
        username.unwrap_or("не указан"),
        user.full_name.as_deref().unwrap_or(""),
    );
    dispatch_action(&bot, &state, &user, msg.chat.id, action, prompt).await
}
