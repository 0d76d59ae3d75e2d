//! Billing routes for Stripe integration

use axum::{
    extract::{Extension, Form, FromRequest, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use offertedesk_billing::{
    BillingOverview, CheckoutRedirect, CreditBalance, PriceCatalog, WebhookOutcome,
};
use offertedesk_shared::CreditLedgerEntry;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Login page for anonymous buyers
pub const LOGIN_PATH: &str = "/login";

const DEFAULT_LEDGER_LIMIT: i64 = 20;

/// Request to create a checkout session
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub price_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
}

/// Accept the price ID from a plain HTML form post or from JSON
async fn read_checkout_request(request: Request) -> Result<CreateCheckoutRequest, ApiError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let req = if is_json {
        let Json(req) = Json::<CreateCheckoutRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        req
    } else {
        let Form(req) = Form::<CreateCheckoutRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        req
    };

    if req.price_id.trim().is_empty() {
        return Err(ApiError::Validation("price_id is required".to_string()));
    }
    Ok(req)
}

/// Start a hosted checkout and redirect the browser to it
pub async fn create_checkout(
    State(state): State<AppState>,
    auth_user: Option<Extension<AuthUser>>,
    request: Request,
) -> Result<Redirect, ApiError> {
    let req = read_checkout_request(request).await?;
    let current_user = auth_user.map(|Extension(user)| user.current_user());

    let redirect = state
        .billing
        .checkout
        .create_checkout_session(req.price_id.trim(), current_user.as_ref())
        .await?;

    match redirect {
        CheckoutRedirect::Login => Ok(Redirect::to(LOGIN_PATH)),
        CheckoutRedirect::HostedPayment { session_id, url } => {
            tracing::info!(session_id = %session_id, "Redirecting to hosted checkout");
            Ok(Redirect::to(&url))
        }
    }
}

/// Handle Stripe webhooks
///
/// Answers 200 for every accepted event, 400 for anything Stripe should not
/// resend and 500 when a retry can succeed.
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    tracing::info!(body_len = body.len(), "Stripe webhook received");

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    match state.billing.webhooks.handle_webhook(&body, signature).await {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::CreditsApplied { .. } => {
                    tracing::info!("Stripe webhook processed successfully")
                }
                other => tracing::debug!(outcome = ?other, "Stripe webhook acknowledged"),
            }
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(e) if e.is_retryable() => {
            tracing::error!(error = %e, "Webhook handling error");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Webhook Error: {}", e)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stripe webhook rejected");
            (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", e)).into_response()
        }
    }
}

/// Current credit balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<CreditBalance>, ApiError> {
    let balance = state.billing.balance.get_balance(auth_user.user_id).await?;
    Ok(Json(balance))
}

/// Credits, plan and invoices for the billing page
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<BillingOverview>, ApiError> {
    let overview = state
        .billing
        .account
        .billing_overview(auth_user.user_id)
        .await?;
    Ok(Json(overview))
}

/// Credit top-up history
pub async fn get_ledger(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<CreditLedgerEntry>>, ApiError> {
    let entries = state
        .billing
        .account
        .ledger_history(auth_user.user_id, query.limit.unwrap_or(DEFAULT_LEDGER_LIMIT))
        .await?;
    Ok(Json(entries))
}

/// Purchasable credit packages and plans
pub async fn get_catalog(State(state): State<AppState>) -> Json<PriceCatalog> {
    Json(state.billing.catalog.as_ref().clone())
}
