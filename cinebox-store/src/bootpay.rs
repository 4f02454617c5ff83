use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinebox_core::{PaymentError, ReceiptStatus, ReceiptVerifier, VerifiedReceipt};
use cinebox_shared::Masked;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// BootPay REST client: access token, receipt lookup, cancel
pub struct BootPayVerifier {
    http: Client,
    base_url: String,
    application_id: String,
    private_key: Masked<String>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    application_id: &'a str,
    private_key: &'a str,
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct TokenData {
    token: String,
}

#[derive(Deserialize)]
struct ReceiptData {
    receipt_id: String,
    order_id: String,
    price: i64,
    status: i64,
    #[serde(default)]
    purchased_at: Option<String>,
}

#[derive(Serialize)]
struct CancelRequest<'a> {
    receipt_id: &'a str,
    price: i64,
    name: &'a str,
    reason: &'a str,
}

/// Gateway status codes: 1 paid, 20 canceled, 0/2 still in progress
fn receipt_status(code: i64) -> ReceiptStatus {
    match code {
        1 => ReceiptStatus::Completed,
        20 => ReceiptStatus::Canceled,
        0 | 2 => ReceiptStatus::Pending,
        _ => ReceiptStatus::Failed,
    }
}

fn parse_purchased_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

impl BootPayVerifier {
    pub fn new(base_url: &str, application_id: &str, private_key: Masked<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            application_id: application_id.to_string(),
            private_key,
        })
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let body = TokenRequest {
            application_id: &self.application_id,
            private_key: self.private_key.expose(),
        };
        let envelope: Envelope<TokenData> = self
            .http
            .post(format!("{}/request/token", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::AccessToken(e.to_string()))?
            .json()
            .await
            .map_err(|e| PaymentError::AccessToken(e.to_string()))?;

        match envelope.data {
            Some(data) if envelope.status == 200 => Ok(data.token),
            _ => Err(PaymentError::AccessToken(
                envelope.message.unwrap_or_else(|| format!("status {}", envelope.status)),
            )),
        }
    }
}

#[async_trait]
impl ReceiptVerifier for BootPayVerifier {
    async fn verify(&self, receipt_id: &str) -> Result<VerifiedReceipt, PaymentError> {
        let token = self.access_token().await?;

        let envelope: Envelope<ReceiptData> = self
            .http
            .get(format!("{}/receipt/{}", self.base_url, receipt_id))
            .header("Authorization", token)
            .send()
            .await
            .map_err(|e| PaymentError::VerifyRequest(e.to_string()))?
            .json()
            .await
            .map_err(|e| PaymentError::VerifyRequest(e.to_string()))?;

        let data = match envelope.data {
            Some(data) if envelope.status == 200 => data,
            _ => {
                return Err(PaymentError::VerifyRequest(
                    envelope.message.unwrap_or_else(|| format!("status {}", envelope.status)),
                ))
            }
        };

        tracing::info!("Receipt {} verified for order {}", data.receipt_id, data.order_id);
        Ok(VerifiedReceipt {
            paid_at: parse_purchased_at(data.purchased_at.as_deref()),
            receipt_id: data.receipt_id,
            order_id: data.order_id,
            price: data.price,
            status: receipt_status(data.status),
        })
    }

    async fn cancel(&self, receipt_id: &str, amount: i64, reason: &str) -> Result<(), PaymentError> {
        let token = self
            .access_token()
            .await
            .map_err(|e| PaymentError::CancelRequest(e.to_string()))?;

        let body = CancelRequest {
            receipt_id,
            price: amount,
            name: "cinebox",
            reason,
        };
        let envelope: Envelope<serde_json::Value> = self
            .http
            .post(format!("{}/cancel", self.base_url))
            .header("Authorization", token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::CancelRequest(e.to_string()))?
            .json()
            .await
            .map_err(|e| PaymentError::CancelRequest(e.to_string()))?;

        if envelope.status != 200 {
            return Err(PaymentError::CancelRequest(
                envelope.message.unwrap_or_else(|| format!("status {}", envelope.status)),
            ));
        }

        tracing::info!("Receipt {} canceled ({} won): {}", receipt_id, amount, reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_status_codes() {
        assert_eq!(receipt_status(1), ReceiptStatus::Completed);
        assert_eq!(receipt_status(20), ReceiptStatus::Canceled);
        assert_eq!(receipt_status(2), ReceiptStatus::Pending);
        assert_eq!(receipt_status(-20), ReceiptStatus::Failed);
    }

    #[test]
    fn test_receipt_envelope_parsing() {
        let raw = r#"{"status":200,"code":0,"message":"","data":{"receipt_id":"5f02a","order_id":"rsv_abc","price":24000,"status":1,"purchased_at":"2020-07-05T13:12:00+09:00"}}"#;
        let envelope: Envelope<ReceiptData> = serde_json::from_str(raw).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.order_id, "rsv_abc");
        assert_eq!(
            parse_purchased_at(data.purchased_at.as_deref()).unwrap().to_rfc3339(),
            "2020-07-05T04:12:00+00:00"
        );
        assert_eq!(parse_purchased_at(Some("yesterday")), None);
    }

    #[test]
    fn test_private_key_not_in_debug() {
        let verifier = BootPayVerifier::new("https://api.bootpay.co.kr/", "app", Masked("pk-123".to_string())).unwrap();
        assert_eq!(verifier.base_url, "https://api.bootpay.co.kr");
        assert_eq!(format!("{:?}", verifier.private_key), "********");
    }
}
