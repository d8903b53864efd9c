/// Minimal escaping for user-controlled values interpolated into HTML
/// parse-mode messages.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Prices are stored in kopecks; user-facing copy shows whole rubles and
/// only keeps the fraction when it is non-zero.
pub fn format_rub(amount_minor: i64) -> String {
    if amount_minor % 100 == 0 {
        format!("{}", amount_minor / 100)
    } else {
        format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
    }
}

/// Deep link into the financial-modeling mini-app for a paid order.
pub fn mini_app_url(host_url: &str, tg_id: i64, order_id: i64) -> String {
    format!(
        "{}/financial-modeling.html?user_id={tg_id}&order_id={order_id}",
        host_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_ruble_prices_have_no_fraction() {
        assert_eq!(format_rub(45000), "450");
        assert_eq!(format_rub(35000), "350");
        assert_eq!(format_rub(19950), "199.50");
    }

    #[test]
    fn mini_app_url_embeds_user_and_order() {
        assert_eq!(
            mini_app_url("https://bot.example/", 555, 7),
            "https://bot.example/financial-modeling.html?user_id=555&order_id=7"
        );
    }

    #[test]
    fn html_escape_covers_angle_brackets() {
        assert_eq!(escape_html("<b>&"), "&lt;b&gt;&amp;");
    }
}
