use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{CreatedPayment, GatewayPaymentStatus, PaymentGateway};

const API_BASE: &str = "https://api.yookassa.ru/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct YooKassaGateway {
    client: Client,
    shop_id: String,
    secret_key: String,
    return_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    status: String,
    #[serde(default)]
    paid: bool,
    amount: Option<AmountObject>,
    confirmation: Option<ConfirmationObject>,
}

#[derive(Debug, Deserialize)]
struct AmountObject {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmationObject {
    confirmation_url: Option<String>,
}

impl YooKassaGateway {
    pub fn new(shop_id: String, secret_key: String, return_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build YooKassa HTTP client")?;
        Ok(Self {
            client,
            shop_id,
            secret_key,
            return_url,
        })
    }
}

#[async_trait]
impl PaymentGateway for YooKassaGateway {
    async fn create_payment(
        &self,
        amount_minor: i64,
        description: &str,
    ) -> Result<CreatedPayment> {
        let body = json!({
            "amount": {
                "value": format_minor(amount_minor),
                "currency": "RUB",
            },
            "confirmation": {
                "type": "redirect",
                "return_url": self.return_url,
            },
            "capture": true,
            "description": description,
        });

        let resp = self
            .client
            .post(format!("{API_BASE}/payments"))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .context("YooKassa create payment request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("YooKassa API error: {status} {text}"));
        }

        let payment: PaymentResponse = resp
            .json()
            .await
            .context("Malformed YooKassa create payment response")?;

        let confirmation_url = payment
            .confirmation
            .and_then(|c| c.confirmation_url)
            .ok_or_else(|| anyhow::anyhow!("YooKassa response has no confirmation URL"))?;

        Ok(CreatedPayment {
            payment_id: payment.id,
            confirmation_url,
        })
    }

    async fn payment_status(&self, payment_id: &str) -> Result<GatewayPaymentStatus> {
        let resp = self
            .client
            .get(format!("{API_BASE}/payments/{payment_id}"))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .send()
            .await
            .context("YooKassa payment status request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("YooKassa API error: {status} {text}"));
        }

        let payment: PaymentResponse = resp
            .json()
            .await
            .context("Malformed YooKassa payment status response")?;

        Ok(GatewayPaymentStatus {
            paid: payment.paid,
            status: payment.status,
            amount_minor: payment.amount.and_then(|a| parse_minor(&a.value)),
        })
    }
}

/// YooKassa serializes amounts as decimal strings, e.g. 45000 kopecks as
/// "450.00".
fn format_minor(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

fn parse_minor(value: &str) -> Option<i64> {
    let (rub, kop) = match value.split_once('.') {
        Some((rub, kop)) => (rub, kop),
        None => (value, "0"),
    };
    let rub: i64 = rub.parse().ok()?;
    let kop: i64 = match kop.len() {
        0 => 0,
        1 => kop.parse::<i64>().ok()? * 10,
        2 => kop.parse().ok()?,
        _ => return None,
    };
    Some(rub * 100 + kop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minor_units_as_decimal_string() {
        assert_eq!(format_minor(45000), "450.00");
        assert_eq!(format_minor(35000), "350.00");
        assert_eq!(format_minor(199), "1.99");
        assert_eq!(format_minor(5), "0.05");
    }

    #[test]
    fn parses_gateway_amount_strings() {
        assert_eq!(parse_minor("450.00"), Some(45000));
        assert_eq!(parse_minor("350"), Some(35000));
        assert_eq!(parse_minor("1.5"), Some(150));
        assert_eq!(parse_minor("abc"), None);
    }
}
