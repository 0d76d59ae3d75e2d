//! Billing error types

use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Stripe API error: {0}")]
    StripeApi(String),

    #[error("Invalid price ID: {0}")]
    InvalidPrice(String),

    #[error("Failed to create checkout session: {0}")]
    SessionCreation(String),

    #[error("Missing webhook signature or webhook secret")]
    WebhookSignatureMissing,

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Invalid webhook payload: {0}")]
    WebhookPayloadInvalid(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Whether the caller should try again later.
    ///
    /// Webhook handlers answer retryable errors with a 5xx so Stripe redelivers
    /// the event; everything else is permanent and answered with a 4xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            BillingError::Database(_) | BillingError::Internal(_) | BillingError::StripeApi(_) => {
                true
            }
            BillingError::InvalidPrice(_)
            | BillingError::SessionCreation(_)
            | BillingError::WebhookSignatureMissing
            | BillingError::WebhookSignatureInvalid
            | BillingError::WebhookPayloadInvalid(_)
            | BillingError::Config(_) => false,
        }
    }
}

impl From<stripe::StripeError> for BillingError {
    fn from(err: stripe::StripeError) -> Self {
        BillingError::StripeApi(err.to_string())
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
