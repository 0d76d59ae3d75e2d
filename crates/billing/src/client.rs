//! Stripe client configuration

use std::time::Duration;

use stripe::Client;

/// Default tolerance between the webhook signature timestamp and now
pub const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);

/// Configuration for Stripe billing
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: String,
    /// Stripe webhook signing secret (`whsec_...`)
    pub webhook_secret: String,
    /// Base URL for success/cancel redirects
    pub app_base_url: String,
    /// Maximum age of a webhook signature timestamp
    pub webhook_tolerance: Duration,
}

impl StripeConfig {
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
            webhook_tolerance: DEFAULT_WEBHOOK_TOLERANCE,
        }
    }

    /// Redirect target after a successful payment
    pub fn success_url(&self) -> String {
        format!("{}/?payment=success", self.app_base_url)
    }

    /// Redirect target after the user abandons the hosted payment page
    pub fn cancel_url(&self) -> String {
        format!("{}/?payment=cancelled", self.app_base_url)
    }
}

/// Stripe billing client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    /// Create a new Stripe client from config
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::new(&config.secret_key);
        Self { client, config }
    }

    /// Get the inner Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the config
    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}
