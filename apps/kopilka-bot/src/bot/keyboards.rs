use kopilka_db::models::store::{Order, ServiceType};
use reqwest::Url;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};

use crate::bot::router::{payment_token, report_token};
use crate::bot::utils::format_rub;

/// Welcome menu: one button per paid service, carrying the order tokens.
pub fn main_menu() -> InlineKeyboardMarkup {
    let service_button = |service: ServiceType, token: &str| {
        InlineKeyboardButton::callback(
            format!(
                "{} — {}₽",
                service.display_name(),
                format_rub(service.price_minor())
            ),
            token,
        )
    };
    InlineKeyboardMarkup::new(vec![
        vec![service_button(ServiceType::Detox, "order_detox")],
        vec![service_button(ServiceType::Modeling, "order_modeling")],
    ])
}

/// Keyboard under the freshly-created order message: the payment link (when
/// it parses as a URL) and the confirmation button whose token the router
/// parses back.
pub fn payment_keyboard(
    order_id: i64,
    gateway_payment_id: &str,
    payment_url: &str,
) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Ok(url) = payment_url.parse::<Url>() {
        rows.push(vec![InlineKeyboardButton::url("💳 Оплатить", url)]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        "✅ Я оплатил",
        payment_token(order_id, gateway_payment_id),
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Mini-app entry button shown once a modeling order is paid.
pub fn mini_app_keyboard(url: &str) -> Option<InlineKeyboardMarkup> {
    let url = url.parse::<Url>().ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::web_app("📊 Открыть калькулятор", WebAppInfo { url }),
    ]]))
}

/// One dispatch button per order awaiting the operator.
pub fn admin_panel_keyboard(orders: &[Order]) -> InlineKeyboardMarkup {
    let rows = orders
        .iter()
        .map(|order| {
            vec![InlineKeyboardButton::callback(
                format!("📤 Заказ #{} — {}", order.id, order.service.display_name()),
                report_token(order.id),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::router::{route, Action, UpdateKind};

    #[test]
    fn payment_keyboard_token_parses_back() {
        let kb = payment_keyboard(42, "abc_def-123", "https://pay.example/x");
        let confirm_row = kb.inline_keyboard.last().expect("confirm row");
        let button = &confirm_row[0];
        let token = match &button.kind {
            teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
            other => panic!("expected callback button, got {other:?}"),
        };
        assert_eq!(
            route(false, UpdateKind::Button(&token)),
            Action::ConfirmPayment {
                order_id: 42,
                payment_id: "abc_def-123".to_string(),
            }
        );
    }

    #[test]
    fn menu_tokens_are_the_wire_constants() {
        let kb = main_menu();
        let tokens: Vec<_> = kb
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, vec!["order_detox", "order_modeling"]);
    }
}
