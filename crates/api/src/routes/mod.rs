//! API routes

pub mod account;
pub mod billing;
pub mod dashboard;
pub mod health;
pub mod quotes;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::{optional_auth, require_auth},
    state::AppState,
};

/// CORS for the configured browser origins; none configured means same-origin only
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes - under /api/v1
    let public_api_routes = Router::new()
        // Stripe webhook (public, uses signature verification)
        .route("/billing/webhook", post(billing::webhook))
        .route("/billing/catalog", get(billing::get_catalog))
        // Anonymous buyers are redirected to the login page
        .route(
            "/billing/checkout",
            post(billing::create_checkout).route_layer(middleware::from_fn_with_state(
                auth_state.clone(),
                optional_auth,
            )),
        );

    // Protected API routes (auth required) - under /api/v1
    let protected_api_routes = Router::new()
        .route("/billing/balance", get(billing::get_balance))
        .route("/billing/overview", get(billing::get_overview))
        .route("/billing/ledger", get(billing::get_ledger))
        .route(
            "/account",
            get(account::get_account).put(account::update_account),
        )
        .route(
            "/settings/pdf",
            get(account::get_pdf_settings).put(account::update_pdf_settings),
        )
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/quotes", get(quotes::list_quotes))
        .route("/planning", get(quotes::get_planning))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    let api_v1_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
