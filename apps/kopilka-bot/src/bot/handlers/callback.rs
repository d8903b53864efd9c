use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{error, info};

use crate::bot::handlers::dispatch_action;
use crate::bot::router::{route, UpdateKind};
use crate::AppState;

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);

    // Stop the button spinner right away; the real answer is the message
    // the dispatched action sends.
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(token) = q.data.as_deref() else {
        return Ok(());
    };

    let tg_id = q.from.id.0 as i64;
    let chat_id = ChatId(tg_id);
    let grant_admin = state.config.admin_tg_ids.contains(&tg_id);
    let user = match state
        .store
        .upsert_user(
            tg_id,
            q.from.username.as_deref(),
            Some(&q.from.full_name()),
            grant_admin,
        )
        .await
    {
        Ok(user) => user,
        Err(e) => {
            error!("User upsert failed for {tg_id}: {e:#}");
            bot.send_message(chat_id, "⚠️ Сервис временно недоступен. Попробуйте позже.")
                .await?;
            return Ok(());
        }
    };

    let action = route(user.is_admin, UpdateKind::Button(token));
    let prompt = format!(
        "Пользователь нажал кнопку: \"{token}\"\n\n\
         Контекст: chat_id={}, tg_id={tg_id}, username={}, имя={}",
        chat_id.0,
        q.from.username.as_deref().unwrap_or("не указан"),
        q.from.full_name(),
    );
    dispatch_action(&bot, &state, &user, chat_id, action, prompt).await
}
