//! Offertedesk API server

use anyhow::Context;
use tokio::net::TcpListener;

use offertedesk_api::{create_router, init_tracing, AppState, Config};
use offertedesk_billing::BillingService;
use offertedesk_shared::{create_pool, create_service_pool, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    let catalog = config
        .load_price_catalog()
        .context("Failed to load price catalog")?;

    tracing::info!(
        bind_address = %config.bind_address,
        credit_packages = catalog.credit_packages().len(),
        subscription_plans = catalog.subscription_plans().len(),
        "Starting Offertedesk API v{}",
        env!("CARGO_PKG_VERSION")
    );
    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set - all webhooks will be rejected");
    }

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    let service_pool = create_service_pool(&config.database_service_url)
        .await
        .context("Failed to connect to database with service credentials")?;

    run_migrations(&service_pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let billing = BillingService::new(
        config.stripe_config(),
        catalog,
        pool.clone(),
        service_pool,
        config.credits_display_max,
    );

    let bind_address = config.bind_address.clone();
    let app = create_router(AppState::new(config, pool, billing));

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
