use kopilka_db::models::store::ServiceType;

/// Everything the bot can be asked to do, produced by [`route`] and
/// exhaustively matched by the dispatcher. Button tokens round-trip through
/// Telegram's callback payload, so their wire format is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateOrder(ServiceType),
    ConfirmPayment { order_id: i64, payment_id: String },
    ShowAdminPanel,
    SendReport { order_id: i64 },
    Fallback,
}

#[derive(Debug, Clone, Copy)]
pub enum UpdateKind<'a> {
    /// Free-text message.
    Text(&'a str),
    /// Inline-button press carrying its opaque token.
    Button(&'a str),
}

/// Pure classification of an inbound update. No side effects; admin-only
/// actions degrade to `Fallback` for everyone else.
pub fn route(is_admin: bool, update: UpdateKind<'_>) -> Action {
    match update {
        UpdateKind::Text(text) => {
            if is_admin && text.trim() == "/admin" {
                Action::ShowAdminPanel
            } else {
                Action::Fallback
            }
        }
        UpdateKind::Button(token) => route_token(is_admin, token),
    }
}

/// The button token the payment message carries; [`route`] must parse it
/// back to the same ids.
pub fn payment_token(order_id: i64, gateway_payment_id: &str) -> String {
    format!("payment_{order_id}_{gateway_payment_id}")
}

pub fn report_token(order_id: i64) -> String {
    format!("send_report_{order_id}")
}

fn route_token(is_admin: bool, token: &str) -> Action {
    match token {
        "order_detox" => return Action::CreateOrder(ServiceType::Detox),
        "order_modeling" => return Action::CreateOrder(ServiceType::Modeling),
        _ => {}
    }

    if let Some(rest) = token.strip_prefix("payment_") {
        // Gateway payment ids may themselves contain underscores, so only
        // the first one after the order id separates the two parts; the
        // remainder is kept whole.
        if let Some((order_part, payment_id)) = rest.split_once('_') {
            if is_decimal(order_part) && !payment_id.is_empty() {
                if let Ok(order_id) = order_part.parse::<i64>() {
                    return Action::ConfirmPayment {
                        order_id,
                        payment_id: payment_id.to_string(),
                    };
                }
            }
        }
        return Action::Fallback;
    }

    if let Some(order_part) = token.strip_prefix("send_report_") {
        if is_admin && is_decimal(order_part) {
            if let Ok(order_id) = order_part.parse::<i64>() {
                return Action::SendReport { order_id };
            }
        }
        return Action::Fallback;
    }

    Action::Fallback
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_tokens_map_to_services() {
        assert_eq!(
            route(false, UpdateKind::Button("order_detox")),
            Action::CreateOrder(ServiceType::Detox)
        );
        assert_eq!(
            route(false, UpdateKind::Button("order_modeling")),
            Action::CreateOrder(ServiceType::Modeling)
        );
    }

    #[test]
    fn payment_id_with_underscores_survives_parsing() {
        assert_eq!(
            route(false, UpdateKind::Button("payment_42_abc_def-123")),
            Action::ConfirmPayment {
                order_id: 42,
                payment_id: "abc_def-123".to_string(),
            }
        );
    }

    #[test]
    fn payment_token_round_trips() {
        let token = payment_token(7, "2f9c_a1-uuid_tail");
        assert_eq!(
            route(false, UpdateKind::Button(&token)),
            Action::ConfirmPayment {
                order_id: 7,
                payment_id: "2f9c_a1-uuid_tail".to_string(),
            }
        );
    }

    #[test]
    fn malformed_payment_tokens_fall_back() {
        for token in [
            "payment_",
            "payment_42",
            "payment_42_",
            "payment_abc_def",
            "payment__pay1",
        ] {
            assert_eq!(route(false, UpdateKind::Button(token)), Action::Fallback);
        }
    }

    #[test]
    fn send_report_requires_admin() {
        assert_eq!(
            route(true, UpdateKind::Button("send_report_12")),
            Action::SendReport { order_id: 12 }
        );
        assert_eq!(
            route(false, UpdateKind::Button("send_report_12")),
            Action::Fallback
        );
        assert_eq!(route(true, UpdateKind::Button("send_report_x")), Action::Fallback);
    }

    #[test]
    fn admin_command_requires_admin() {
        assert_eq!(route(true, UpdateKind::Text("/admin")), Action::ShowAdminPanel);
        assert_eq!(route(false, UpdateKind::Text("/admin")), Action::Fallback);
        assert_eq!(route(true, UpdateKind::Text("/admin panel")), Action::Fallback);
    }

    #[test]
    fn free_text_falls_back() {
        assert_eq!(
            route(false, UpdateKind::Text("сколько я могу тратить в день?")),
            Action::Fallback
        );
        assert_eq!(route(false, UpdateKind::Button("noop")), Action::Fallback);
    }
}
