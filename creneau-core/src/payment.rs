use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Redirect target returned by the payment provider for a deposit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRedirect {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub url: String,
}

/// External payment collaborator. Invoked only after a booking is
/// confirmed and only when a deposit is requested; its failure never
/// reverts the booking.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn create_redirect(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
    ) -> Result<PaymentRedirect, Box<dyn std::error::Error + Send + Sync>>;
}

pub struct MockPaymentAdapter;

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_redirect(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
    ) -> Result<PaymentRedirect, Box<dyn std::error::Error + Send + Sync>> {
        Ok(PaymentRedirect {
            booking_id,
            amount_cents,
            url: format!("https://pay.example.test/checkout/{}", booking_id.simple()),
        })
    }
}
