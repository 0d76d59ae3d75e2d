// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Offertedesk Billing Module
//!
//! Credits-based billing on top of Stripe Checkout.
//!
//! ## Features
//!
//! - **Price Catalog**: Credit packages and subscription plans keyed by Stripe price ID
//! - **Checkout**: Hosted payment sessions carrying the credit grant in their metadata
//! - **Webhooks**: Signed completion events turned into exactly-once credit grants
//! - **Credit Ledger**: Append-only grant history with an atomic balance increment
//! - **Balance & Overview**: Credit meter, active plan and invoice history

pub mod account;
pub mod balance;
pub mod catalog;
pub mod checkout;
pub mod client;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod webhooks;

// Account
pub use account::{
    format_euro, AccountService, BillingOverview, InvoiceSummary, PlanInfo, RECENT_INVOICE_LIMIT,
};

// Balance
pub use balance::{BalanceReader, CreditBalance, DEFAULT_CREDITS_DISPLAY_MAX};

// Catalog
pub use catalog::{CatalogEntry, CreditPackage, PriceCatalog, SubscriptionPlan};

// Checkout
pub use checkout::{
    CheckoutGateway, CheckoutMode, CheckoutRedirect, CheckoutRequest, CheckoutService,
    CreatedSession, PaymentMethod,
};

// Client
pub use client::{StripeClient, StripeConfig};

// Error
pub use error::{BillingError, BillingResult};

// Ledger
pub use ledger::{AccountRecords, CreditGrantRequest, CreditStore, GrantOutcome, PgBillingStore};
pub use memory::MemoryBillingStore;

// Webhooks
pub use webhooks::{NoGrantReason, SessionGrant, WebhookEvent, WebhookHandler, WebhookOutcome};

use std::sync::Arc;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub catalog: Arc<PriceCatalog>,
    pub checkout: CheckoutService,
    pub webhooks: WebhookHandler,
    pub balance: BalanceReader,
    pub account: AccountService,
}

impl BillingService {
    /// Create a billing service backed by Stripe and Postgres
    ///
    /// `service_pool` is only used to apply webhook grants.
    pub fn new(
        config: StripeConfig,
        catalog: PriceCatalog,
        pool: PgPool,
        service_pool: PgPool,
        credits_display_max: i64,
    ) -> Self {
        let store = Arc::new(PgBillingStore::new(pool, service_pool));
        let stripe = Arc::new(StripeClient::new(config.clone()));

        Self::with_components(
            config,
            Arc::new(catalog),
            stripe,
            store.clone(),
            store,
            credits_display_max,
        )
    }

    /// Assemble a billing service from explicit collaborators
    pub fn with_components(
        config: StripeConfig,
        catalog: Arc<PriceCatalog>,
        gateway: Arc<dyn CheckoutGateway>,
        credits: Arc<dyn CreditStore>,
        records: Arc<dyn AccountRecords>,
        credits_display_max: i64,
    ) -> Self {
        let balance = BalanceReader::new(credits.clone(), credits_display_max);

        Self {
            checkout: CheckoutService::new(catalog.clone(), gateway, config.clone()),
            webhooks: WebhookHandler::new(config, credits.clone()),
            account: AccountService::new(records, credits, balance.clone(), catalog.clone()),
            balance,
            catalog,
        }
    }
}
