//! Stripe Checkout sessions
//!
//! Turns a price ID from the catalog into a hosted payment page. The session
//! metadata (`userId` and, when a grant applies, `creditsToAdd`) is the only
//! state that survives until the completion webhook fires, so it is built
//! here and nowhere else.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionPaymentMethodTypes,
};

use offertedesk_shared::CurrentUser;

use crate::catalog::PriceCatalog;
use crate::client::{StripeClient, StripeConfig};
use crate::error::{BillingError, BillingResult};

/// Metadata key carrying the buyer's user ID
pub const METADATA_USER_ID: &str = "userId";
/// Metadata key carrying the string-encoded credit grant
pub const METADATA_CREDITS_TO_ADD: &str = "creditsToAdd";

/// Checkout mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// One-time payment (credit packages)
    Payment,
    /// Recurring payment (subscription plans)
    Subscription,
}

/// Payment methods offered on the hosted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    Ideal,
}

/// Offered for both one-time purchases and subscriptions
pub const PAYMENT_METHODS: [PaymentMethod; 2] = [PaymentMethod::Card, PaymentMethod::Ideal];

/// Provider-neutral description of the session to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub mode: CheckoutMode,
    pub price_id: String,
    pub quantity: u64,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
    pub allow_promotion_codes: bool,
    pub payment_methods: Vec<PaymentMethod>,
}

/// Session as returned by the payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: String,
    pub url: Option<String>,
}

/// Where to send the user after initiating checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutRedirect {
    /// No authenticated user; send them to the login page
    Login,
    /// Hosted payment page
    HostedPayment { session_id: String, url: String },
}

/// Creates checkout sessions at the payment provider
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> BillingResult<CreatedSession>;
}

#[async_trait]
impl CheckoutGateway for StripeClient {
    async fn create_session(&self, request: &CheckoutRequest) -> BillingResult<CreatedSession> {
        let mode = match request.mode {
            CheckoutMode::Payment => CheckoutSessionMode::Payment,
            CheckoutMode::Subscription => CheckoutSessionMode::Subscription,
        };

        let payment_method_types: Vec<CreateCheckoutSessionPaymentMethodTypes> = request
            .payment_methods
            .iter()
            .map(|method| match method {
                PaymentMethod::Card => CreateCheckoutSessionPaymentMethodTypes::Card,
                PaymentMethod::Ideal => CreateCheckoutSessionPaymentMethodTypes::Ideal,
            })
            .collect();

        let params = CreateCheckoutSession {
            mode: Some(mode),
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price: Some(request.price_id.clone()),
                quantity: Some(request.quantity),
                ..Default::default()
            }]),
            success_url: Some(&request.success_url),
            cancel_url: Some(&request.cancel_url),
            customer_email: request.customer_email.as_deref(),
            metadata: Some(request.metadata.clone()),
            allow_promotion_codes: Some(request.allow_promotion_codes),
            payment_method_types: (!payment_method_types.is_empty()).then_some(payment_method_types),
            ..Default::default()
        };

        let session = CheckoutSession::create(self.inner(), params).await?;

        Ok(CreatedSession {
            id: session.id.to_string(),
            url: session.url,
        })
    }
}

/// Checkout service for creating Stripe checkout sessions
#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<PriceCatalog>,
    gateway: Arc<dyn CheckoutGateway>,
    config: StripeConfig,
}

impl CheckoutService {
    pub fn new(
        catalog: Arc<PriceCatalog>,
        gateway: Arc<dyn CheckoutGateway>,
        config: StripeConfig,
    ) -> Self {
        Self {
            catalog,
            gateway,
            config,
        }
    }

    /// Build the session parameters for a price ID without contacting Stripe
    pub fn build_request(
        &self,
        price_id: &str,
        user: &CurrentUser,
    ) -> BillingResult<CheckoutRequest> {
        let entry = self.catalog.resolve(price_id).ok_or_else(|| {
            // Catalog and purchase buttons are out of sync
            tracing::error!(
                user_id = %user.id,
                price_id = %price_id,
                "Checkout requested for a price ID that is not in the catalog"
            );
            BillingError::InvalidPrice(price_id.to_string())
        })?;

        let mode = if entry.is_subscription() {
            CheckoutMode::Subscription
        } else {
            CheckoutMode::Payment
        };

        let mut metadata = HashMap::new();
        metadata.insert(METADATA_USER_ID.to_string(), user.id.to_string());
        if let Some(credits) = entry.credit_grant() {
            metadata.insert(METADATA_CREDITS_TO_ADD.to_string(), credits.to_string());
        }

        Ok(CheckoutRequest {
            mode,
            price_id: price_id.to_string(),
            quantity: 1,
            customer_email: user.email.clone().filter(|e| !e.trim().is_empty()),
            success_url: self.config.success_url(),
            cancel_url: self.config.cancel_url(),
            metadata,
            allow_promotion_codes: true,
            payment_methods: PAYMENT_METHODS.to_vec(),
        })
    }

    /// Create a checkout session for a catalog price
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        user: Option<&CurrentUser>,
    ) -> BillingResult<CheckoutRedirect> {
        let Some(user) = user else {
            return Ok(CheckoutRedirect::Login);
        };

        let request = self.build_request(price_id, user)?;
        let session = self.gateway.create_session(&request).await?;

        let url = session.url.ok_or_else(|| {
            tracing::error!(
                user_id = %user.id,
                session_id = %session.id,
                "Stripe returned a checkout session without a URL"
            );
            BillingError::SessionCreation(format!("session {} has no URL", session.id))
        })?;

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            price_id = %price_id,
            mode = ?request.mode,
            credits_to_add = ?request.metadata.get(METADATA_CREDITS_TO_ADD),
            "Created checkout session"
        );

        Ok(CheckoutRedirect::HostedPayment {
            session_id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CreditPackage, SubscriptionPlan};
    use offertedesk_shared::UserId;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed session
    struct RecordingGateway {
        requests: Mutex<Vec<CheckoutRequest>>,
        url: Option<String>,
    }

    impl RecordingGateway {
        fn new(url: Option<&str>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                url: url.map(str::to_string),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last(&self) -> CheckoutRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl CheckoutGateway for RecordingGateway {
        async fn create_session(
            &self,
            request: &CheckoutRequest,
        ) -> BillingResult<CreatedSession> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(CreatedSession {
                id: "cs_test_123".to_string(),
                url: self.url.clone(),
            })
        }
    }

    fn catalog() -> Arc<PriceCatalog> {
        let mut plans = PriceCatalog::builtin().subscription_plans().to_vec();
        plans.push(SubscriptionPlan {
            id: "price_plan_with_credits".to_string(),
            name: "Bonus".to_string(),
            description: String::new(),
            price: "€ 49 /mnd".to_string(),
            popular: false,
            amount: 4900,
            credits: Some(20),
        });
        let packages: Vec<CreditPackage> = PriceCatalog::builtin().credit_packages().to_vec();
        Arc::new(PriceCatalog::new(packages, plans).unwrap())
    }

    fn service(gateway: Arc<RecordingGateway>) -> CheckoutService {
        CheckoutService::new(
            catalog(),
            gateway,
            StripeConfig::new("sk_test", "whsec_test", "https://app.example.nl"),
        )
    }

    fn user() -> CurrentUser {
        CurrentUser::new(UserId::new(), Some("jan@bouwbedrijf.nl".to_string()))
    }

    #[tokio::test]
    async fn test_credit_packages_use_payment_mode_with_grant() {
        let gateway = Arc::new(RecordingGateway::new(Some("https://checkout.stripe.com/c/pay")));
        let checkout = service(gateway.clone());
        let user = user();

        for package in PriceCatalog::builtin().credit_packages() {
            let redirect = checkout
                .create_checkout_session(&package.id, Some(&user))
                .await
                .unwrap();
            assert_eq!(
                redirect,
                CheckoutRedirect::HostedPayment {
                    session_id: "cs_test_123".to_string(),
                    url: "https://checkout.stripe.com/c/pay".to_string(),
                }
            );

            let request = gateway.last();
            assert_eq!(request.mode, CheckoutMode::Payment);
            assert_eq!(request.price_id, package.id);
            assert_eq!(request.quantity, 1);
            assert_eq!(
                request.metadata.get(METADATA_CREDITS_TO_ADD),
                Some(&package.credits.to_string())
            );
            assert_eq!(
                request.metadata.get(METADATA_USER_ID),
                Some(&user.id.to_string())
            );
        }
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn test_plans_without_credits_omit_grant() {
        let gateway = Arc::new(RecordingGateway::new(Some("https://checkout.stripe.com/c/sub")));
        let checkout = service(gateway.clone());

        for plan in PriceCatalog::builtin().subscription_plans() {
            checkout
                .create_checkout_session(&plan.id, Some(&user()))
                .await
                .unwrap();
            let request = gateway.last();
            assert_eq!(request.mode, CheckoutMode::Subscription);
            assert!(!request.metadata.contains_key(METADATA_CREDITS_TO_ADD));
            assert_eq!(request.metadata.len(), 1);
            assert_eq!(
                request.payment_methods,
                [PaymentMethod::Card, PaymentMethod::Ideal]
            );
        }
    }

    #[tokio::test]
    async fn test_plan_with_initial_credits_carries_grant() {
        let gateway = Arc::new(RecordingGateway::new(Some("https://checkout.stripe.com/c/sub")));
        let checkout = service(gateway.clone());

        checkout
            .create_checkout_session("price_plan_with_credits", Some(&user()))
            .await
            .unwrap();
        let request = gateway.last();
        assert_eq!(request.mode, CheckoutMode::Subscription);
        assert_eq!(
            request.metadata.get(METADATA_CREDITS_TO_ADD).map(String::as_str),
            Some("20")
        );
    }

    #[tokio::test]
    async fn test_unknown_price_fails_without_contacting_stripe() {
        let gateway = Arc::new(RecordingGateway::new(Some("https://checkout.stripe.com/c/pay")));
        let checkout = service(gateway.clone());

        let result = checkout
            .create_checkout_session("price_does_not_exist", Some(&user()))
            .await;
        assert!(matches!(result, Err(BillingError::InvalidPrice(id)) if id == "price_does_not_exist"));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_user_redirects_to_login() {
        let gateway = Arc::new(RecordingGateway::new(Some("https://checkout.stripe.com/c/pay")));
        let checkout = service(gateway.clone());

        let redirect = checkout
            .create_checkout_session("price_1SfPuiKFRd9JfwYZxfYqg60H", None)
            .await
            .unwrap();
        assert_eq!(redirect, CheckoutRedirect::Login);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_session_without_url_is_an_error() {
        let gateway = Arc::new(RecordingGateway::new(None));
        let checkout = service(gateway.clone());

        let result = checkout
            .create_checkout_session("price_1SfPuiKFRd9JfwYZxfYqg60H", Some(&user()))
            .await;
        assert!(matches!(result, Err(BillingError::SessionCreation(_))));
        assert_eq!(gateway.calls(), 1);
    }

    #[test]
    fn test_request_carries_redirects_and_email() {
        let checkout = service(Arc::new(RecordingGateway::new(None)));
        let user = user();
        let request = checkout
            .build_request("price_1SfQgGKFRd9JfwYZSsiZWosA", &user)
            .unwrap();

        assert_eq!(request.success_url, "https://app.example.nl/?payment=success");
        assert_eq!(request.cancel_url, "https://app.example.nl/?payment=cancelled");
        assert_eq!(request.customer_email.as_deref(), Some("jan@bouwbedrijf.nl"));
        assert!(request.allow_promotion_codes);

        let anonymous_email = CurrentUser::new(user.id, Some("  ".to_string()));
        let request = checkout
            .build_request("price_1SfQgGKFRd9JfwYZSsiZWosA", &anonymous_email)
            .unwrap();
        assert_eq!(request.customer_email, None);
    }
}
