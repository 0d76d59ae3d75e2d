//! Stripe webhook handling
//!
//! Turns signed checkout-completion events into credit grants. The signature is
//! verified by hand against the raw body, the event is decoded into a minimal
//! shape (only `id`, `type`, `created` and the session object are read), and
//! the grant is applied through the [`CreditStore`], which makes redelivery a
//! no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use offertedesk_shared::UserId;

use crate::checkout::{METADATA_CREDITS_TO_ADD, METADATA_USER_ID};
use crate::client::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::ledger::{CreditGrantRequest, CreditStore, GrantOutcome};

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";

/// The parts of a Stripe event this handler reads
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// Why a paid session carries no grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoGrantReason {
    MissingUserId,
    MissingCredits,
    InvalidUserId(String),
    InvalidCredits(String),
}

impl NoGrantReason {
    /// Malformed metadata points at a bug on our side, not at a plain subscription
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            NoGrantReason::InvalidUserId(_) | NoGrantReason::InvalidCredits(_)
        )
    }
}

impl std::fmt::Display for NoGrantReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoGrantReason::MissingUserId => write!(f, "metadata has no {}", METADATA_USER_ID),
            NoGrantReason::MissingCredits => {
                write!(f, "metadata has no {}", METADATA_CREDITS_TO_ADD)
            }
            NoGrantReason::InvalidUserId(raw) => write!(f, "invalid user id {:?}", raw),
            NoGrantReason::InvalidCredits(raw) => write!(f, "invalid credit amount {:?}", raw),
        }
    }
}

/// Session metadata, decoded once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionGrant {
    CreditGrant { user_id: UserId, amount: i64 },
    NoGrant(NoGrantReason),
}

impl SessionGrant {
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let Some(raw_user) = metadata.get(METADATA_USER_ID) else {
            return SessionGrant::NoGrant(NoGrantReason::MissingUserId);
        };
        let Some(raw_credits) = metadata.get(METADATA_CREDITS_TO_ADD) else {
            return SessionGrant::NoGrant(NoGrantReason::MissingCredits);
        };

        let user_id = match raw_user.parse::<UserId>() {
            Ok(id) => id,
            Err(_) => return SessionGrant::NoGrant(NoGrantReason::InvalidUserId(raw_user.clone())),
        };
        match raw_credits.trim().parse::<i64>() {
            Ok(amount) if amount > 0 => SessionGrant::CreditGrant { user_id, amount },
            _ => SessionGrant::NoGrant(NoGrantReason::InvalidCredits(raw_credits.clone())),
        }
    }
}

/// How an accepted webhook was handled. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    CreditsApplied {
        user_id: UserId,
        amount: i64,
        new_balance: i64,
    },
    /// The event or its session was applied before
    Duplicate,
    NoGrant(NoGrantReason),
    /// Completed with a delayed payment method; the grant comes with the
    /// async-payment-succeeded event
    AwaitingPayment,
    Ignored { event_type: String },
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against the raw body.
///
/// The HMAC-SHA256 key is the webhook secret exactly as issued, `whsec_` prefix
/// included.
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: i64,
) -> BillingResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            match key {
                "t" => timestamp = value.parse().ok(),
                "v1" => signatures.push(value),
                _ => {}
            }
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        tracing::warn!("Missing timestamp in signature header");
        BillingError::WebhookSignatureInvalid
    })?;
    if signatures.is_empty() {
        tracing::warn!("Missing v1 signature in signature header");
        return Err(BillingError::WebhookSignatureInvalid);
    }

    if now.abs_diff(timestamp) > tolerance.as_secs() {
        tracing::warn!(
            timestamp = timestamp,
            now = now,
            "Webhook timestamp outside tolerance"
        );
        return Err(BillingError::WebhookSignatureInvalid);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| BillingError::WebhookSignatureInvalid)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let expected = mac.finalize().into_bytes();

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|decoded| bool::from(expected.as_slice().ct_eq(decoded.as_slice())))
            .unwrap_or(false)
    });

    if !matched {
        tracing::warn!("Webhook signature mismatch");
        return Err(BillingError::WebhookSignatureInvalid);
    }

    Ok(())
}

/// Webhook handler for Stripe events
pub struct WebhookHandler {
    config: StripeConfig,
    store: Arc<dyn CreditStore>,
}

impl WebhookHandler {
    pub fn new(config: StripeConfig, store: Arc<dyn CreditStore>) -> Self {
        Self { config, store }
    }

    /// Verify the signature and decode the event
    pub fn verify_event(&self, payload: &str, signature: Option<&str>) -> BillingResult<WebhookEvent> {
        self.verify_event_at(payload, signature, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn verify_event_at(
        &self,
        payload: &str,
        signature: Option<&str>,
        now: i64,
    ) -> BillingResult<WebhookEvent> {
        let secret = self.config.webhook_secret.as_str();
        let signature = signature.filter(|s| !s.trim().is_empty());
        let (Some(signature), false) = (signature, secret.is_empty()) else {
            tracing::warn!("Webhook rejected: signature header or webhook secret missing");
            return Err(BillingError::WebhookSignatureMissing);
        };

        verify_signature(payload, signature, secret, self.config.webhook_tolerance, now)?;

        serde_json::from_str(payload).map_err(|e| {
            tracing::error!(parse_error = %e, "Failed to parse webhook event JSON");
            BillingError::WebhookPayloadInvalid(e.to_string())
        })
    }

    /// Handle a verified event
    pub async fn handle_event(&self, event: WebhookEvent) -> BillingResult<WebhookOutcome> {
        let event_type = event.event_type.as_str();
        if event_type != CHECKOUT_SESSION_COMPLETED
            && event_type != CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED
        {
            tracing::debug!(event_id = %event.id, event_type = %event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let session: CheckoutSessionObject = serde_json::from_value(event.data.object.clone())
            .map_err(|e| {
                tracing::error!(event_id = %event.id, error = %e, "Event carries no checkout session");
                BillingError::WebhookPayloadInvalid(e.to_string())
            })?;

        if event_type == CHECKOUT_SESSION_COMPLETED
            && session.payment_status.as_deref() == Some("unpaid")
        {
            tracing::info!(
                event_id = %event.id,
                session_id = %session.id,
                "Checkout completed without payment; waiting for async payment"
            );
            return Ok(WebhookOutcome::AwaitingPayment);
        }

        let metadata = session.metadata.unwrap_or_default();
        let (user_id, amount) = match SessionGrant::from_metadata(&metadata) {
            SessionGrant::CreditGrant { user_id, amount } => (user_id, amount),
            SessionGrant::NoGrant(reason) => {
                if reason.is_anomaly() {
                    tracing::error!(
                        event_id = %event.id,
                        session_id = %session.id,
                        reason = %reason,
                        "Paid session has unusable credit metadata"
                    );
                } else {
                    tracing::info!(
                        event_id = %event.id,
                        session_id = %session.id,
                        reason = %reason,
                        "Paid session carries no credit grant"
                    );
                }
                return Ok(WebhookOutcome::NoGrant(reason));
            }
        };

        let grant = CreditGrantRequest {
            user_id,
            amount,
            stripe_event_id: event.id.clone(),
            stripe_session_id: Some(session.id.clone()),
            reason: event.event_type.clone(),
        };

        match self.store.apply_grant(&grant).await {
            Ok(GrantOutcome::Applied {
                entry_id,
                new_balance,
            }) => {
                tracing::info!(
                    event_id = %event.id,
                    user_id = %user_id,
                    amount = amount,
                    new_balance = new_balance,
                    ledger_entry = %entry_id,
                    "Credits added"
                );
                Ok(WebhookOutcome::CreditsApplied {
                    user_id,
                    amount,
                    new_balance,
                })
            }
            Ok(GrantOutcome::Duplicate) => {
                tracing::info!(
                    event_id = %event.id,
                    session_id = %session.id,
                    "Duplicate webhook event, credits already applied"
                );
                Ok(WebhookOutcome::Duplicate)
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to apply credit grant"
                );
                Err(e)
            }
        }
    }

    /// Verify, decode and apply a raw webhook delivery
    pub async fn handle_webhook(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> BillingResult<WebhookOutcome> {
        let event = self.verify_event(payload, signature)?;
        self.handle_event(event).await
    }
}
