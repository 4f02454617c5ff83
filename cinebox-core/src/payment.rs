use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    Pending,
    Completed,
    Canceled,
    Failed,
}

/// A payment receipt as reported by the payment gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedReceipt {
    pub receipt_id: String,
    /// Merchant order id the client passed to the gateway (our reservation's payment id)
    pub order_id: String,
    pub price: i64,
    pub status: ReceiptStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl VerifiedReceipt {
    pub fn is_completed(&self) -> bool {
        self.status == ReceiptStatus::Completed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Failed to obtain gateway access token: {0}")]
    AccessToken(String),

    #[error("Receipt verification request failed: {0}")]
    VerifyRequest(String),

    #[error("Payment cancel request failed: {0}")]
    CancelRequest(String),
}

/// Gateway-side receipt lookup and refund
#[async_trait]
pub trait ReceiptVerifier: Send + Sync {
    /// Look up a receipt by the gateway's receipt id
    async fn verify(&self, receipt_id: &str) -> Result<VerifiedReceipt, PaymentError>;

    /// Cancel (refund) `amount` of a completed receipt
    async fn cancel(&self, receipt_id: &str, amount: i64, reason: &str) -> Result<(), PaymentError>;
}

/// In-process gateway used by tests and local runs. Receipts must be registered
/// before they can be verified.
#[derive(Default)]
pub struct MockReceiptVerifier {
    receipts: RwLock<HashMap<String, VerifiedReceipt>>,
    canceled: RwLock<Vec<String>>,
    fail_cancel: AtomicBool,
}

impl MockReceiptVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, receipt: VerifiedReceipt) {
        self.receipts.write().await.insert(receipt.receipt_id.clone(), receipt);
    }

    /// Convenience for a completed receipt of `price` against `order_id`
    pub async fn register_completed(&self, receipt_id: &str, order_id: &str, price: i64) {
        self.register(VerifiedReceipt {
            receipt_id: receipt_id.to_string(),
            order_id: order_id.to_string(),
            price,
            status: ReceiptStatus::Completed,
            paid_at: Some(Utc::now()),
        })
        .await;
    }

    /// Make subsequent `cancel` calls fail
    pub fn set_fail_cancel(&self, fail: bool) {
        self.fail_cancel.store(fail, Ordering::SeqCst);
    }

    pub async fn canceled_receipts(&self) -> Vec<String> {
        self.canceled.read().await.clone()
    }
}

#[async_trait]
impl ReceiptVerifier for MockReceiptVerifier {
    async fn verify(&self, receipt_id: &str) -> Result<VerifiedReceipt, PaymentError> {
        tracing::info!("Mock gateway verifying receipt {}", receipt_id);

        self.receipts
            .read()
            .await
            .get(receipt_id)
            .cloned()
            .ok_or_else(|| PaymentError::VerifyRequest(format!("receipt {} not found", receipt_id)))
    }

    async fn cancel(&self, receipt_id: &str, amount: i64, reason: &str) -> Result<(), PaymentError> {
        if self.fail_cancel.load(Ordering::SeqCst) {
            return Err(PaymentError::CancelRequest("simulated gateway failure".to_string()));
        }

        let mut receipts = self.receipts.write().await;
        let receipt = receipts
            .get_mut(receipt_id)
            .ok_or_else(|| PaymentError::CancelRequest(format!("receipt {} not found", receipt_id)))?;

        if receipt.status != ReceiptStatus::Completed {
            return Err(PaymentError::CancelRequest(format!("receipt {} is not cancelable", receipt_id)));
        }
        if receipt.price != amount {
            return Err(PaymentError::CancelRequest(format!(
                "cancel amount {} differs from paid amount {}",
                amount, receipt.price
            )));
        }

        receipt.status = ReceiptStatus::Canceled;
        self.canceled.write().await.push(receipt_id.to_string());
        tracing::info!("Mock gateway canceled receipt {} ({})", receipt_id, reason);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_verify_and_cancel() {
        let gateway = MockReceiptVerifier::new();
        gateway.register_completed("r-1", "rsv_abc", 24000).await;

        let receipt = gateway.verify("r-1").await.unwrap();
        assert_eq!(receipt.order_id, "rsv_abc");
        assert!(receipt.is_completed());

        assert!(gateway.cancel("r-1", 1000, "test").await.is_err());
        gateway.cancel("r-1", 24000, "test").await.unwrap();
        assert_eq!(gateway.canceled_receipts().await, vec!["r-1".to_string()]);

        // A canceled receipt cannot be canceled again
        assert!(gateway.cancel("r-1", 24000, "test").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_receipt() {
        let gateway = MockReceiptVerifier::new();
        assert!(matches!(gateway.verify("missing").await, Err(PaymentError::VerifyRequest(_))));
    }
}
