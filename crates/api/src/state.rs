//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use offertedesk_billing::BillingService;

use crate::auth::{AuthState, JwtManager};
use crate::config::Config;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Request-path pool; queries run in `begin_user_scope` transactions acting as the caller
    pub pool: PgPool,
    pub billing: Arc<BillingService>,
    pub jwt: JwtManager,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, billing: BillingService) -> Self {
        let jwt = JwtManager::new(&config.supabase_jwt_secret);
        Self {
            config: Arc::new(config),
            pool,
            billing: Arc::new(billing),
            jwt,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt: self.jwt.clone(),
        }
    }
}
