//! Application configuration

use std::env;

use offertedesk_billing::{PriceCatalog, StripeConfig, DEFAULT_CREDITS_DISPLAY_MAX};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,
    pub cors_allowed_origins: Vec<String>,

    // Database
    pub database_url: String,
    /// Service-role connection, used only to apply webhook credit grants
    pub database_service_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub supabase_jwt_secret: String,

    // Stripe
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,

    // Billing
    pub price_catalog_path: Option<String>,
    pub credits_display_max: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),

            // Database
            database_service_url: env::var("DATABASE_SERVICE_URL")
                .ok()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| database_url.clone()),
            database_url,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            // Authentication
            supabase_jwt_secret: {
                let secret = env::var("SUPABASE_JWT_SECRET")
                    .map_err(|_| ConfigError::Missing("SUPABASE_JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "SUPABASE_JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },

            // Stripe
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),

            // Billing
            price_catalog_path: env::var("PRICE_CATALOG_PATH")
                .ok()
                .filter(|path| !path.is_empty()),
            credits_display_max: match env::var("CREDITS_DISPLAY_MAX") {
                Ok(raw) => match raw.trim().parse::<i64>() {
                    Ok(max) if max > 0 => max,
                    _ => {
                        return Err(ConfigError::Invalid(
                            "CREDITS_DISPLAY_MAX must be a positive integer",
                        ))
                    }
                },
                Err(_) => DEFAULT_CREDITS_DISPLAY_MAX,
            },
        })
    }

    /// Stripe settings for the billing service; redirects go back to `public_url`
    pub fn stripe_config(&self) -> StripeConfig {
        StripeConfig::new(
            self.stripe_secret_key.clone(),
            self.stripe_webhook_secret.clone(),
            self.public_url.clone(),
        )
    }

    /// The catalog at `PRICE_CATALOG_PATH`, or the built-in production catalog
    pub fn load_price_catalog(&self) -> Result<PriceCatalog, ConfigError> {
        let Some(path) = &self.price_catalog_path else {
            return Ok(PriceCatalog::builtin());
        };

        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Catalog(format!("{}: {}", path, e)))?;
        PriceCatalog::from_json_str(&json).map_err(|e| ConfigError::Catalog(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Invalid price catalog: {0}")]
    Catalog(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "DATABASE_SERVICE_URL",
        "SUPABASE_JWT_SECRET",
        "PUBLIC_URL",
        "CORS_ALLOWED_ORIGINS",
        "PRICE_CATALOG_PATH",
        "CREDITS_DISPLAY_MAX",
    ];

    /// Helper to set required env vars for testing
    fn setup_minimal_config() {
        for var in VARS {
            env::remove_var(var);
        }
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var(
            "SUPABASE_JWT_SECRET",
            "test-supabase-secret-at-least-32-characters",
        );
    }

    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        setup_minimal_config();

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.database_service_url, "postgres://test");
        assert_eq!(config.credits_display_max, 50);
        assert!(config.cors_allowed_origins.is_empty());
        assert!(config.price_catalog_path.is_none());
        assert_eq!(config.load_price_catalog().unwrap().credit_packages().len(), 3);

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        setup_minimal_config();
        env::set_var("DATABASE_SERVICE_URL", "postgres://service");
        env::set_var("PUBLIC_URL", "https://app.offertedesk.nl/");
        env::set_var(
            "CORS_ALLOWED_ORIGINS",
            "https://offertedesk.nl, https://app.offertedesk.nl",
        );
        env::set_var("CREDITS_DISPLAY_MAX", "100");

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_service_url, "postgres://service");
        assert_eq!(config.public_url, "https://app.offertedesk.nl");
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert_eq!(config.credits_display_max, 100);
        assert_eq!(
            config.stripe_config().success_url(),
            "https://app.offertedesk.nl/?payment=success"
        );

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_rejects_missing_and_invalid_values() {
        setup_minimal_config();
        env::remove_var("SUPABASE_JWT_SECRET");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("SUPABASE_JWT_SECRET"))
        ));

        env::set_var("SUPABASE_JWT_SECRET", "short");
        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret(_))));

        setup_minimal_config();
        env::set_var("CREDITS_DISPLAY_MAX", "0");
        assert!(matches!(Config::from_env(), Err(ConfigError::Invalid(_))));

        setup_minimal_config();
        env::remove_var("DATABASE_URL");
        assert!(matches!(Config::from_env(), Err(ConfigError::Missing("DATABASE_URL"))));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_missing_catalog_file_is_an_error() {
        setup_minimal_config();
        env::set_var("PRICE_CATALOG_PATH", "/nonexistent/catalog.json");

        let config = Config::from_env().unwrap();
        assert!(matches!(config.load_price_catalog(), Err(ConfigError::Catalog(_))));

        cleanup_config();
    }
}
