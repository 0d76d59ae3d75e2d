//! Supabase JWT validation

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use offertedesk_shared::{CurrentUser, UserId};

/// Audience Supabase puts on tokens of signed-in users
pub const SUPABASE_AUDIENCE: &str = "authenticated";

/// JWT claims structure for Supabase-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// Subject (user ID as string, will be parsed to UUID)
    pub sub: String,
    pub email: Option<String>,
    /// Role (authenticated, anon, etc.)
    pub role: Option<String>,
    pub aud: Option<String>,
    pub iat: Option<i64>,
    pub exp: i64,
}

impl SupabaseClaims {
    /// The caller identified by these claims
    pub fn current_user(&self) -> Result<CurrentUser, JwtError> {
        let id: UserId = self.sub.parse().map_err(|_| JwtError::InvalidSubject)?;
        let email = self.email.clone().filter(|email| !email.is_empty());
        Ok(CurrentUser::new(id, email))
    }
}

/// Validates tokens issued by the authentication provider
#[derive(Clone)]
pub struct JwtManager {
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(supabase_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(supabase_secret.as_bytes()),
        }
    }

    /// Validate a Supabase-issued JWT token
    ///
    /// HS256 only, audience must be `authenticated`.
    pub fn validate_supabase_token(&self, token: &str) -> Result<SupabaseClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60; // 60 second clock skew tolerance
        validation.set_audience(&[SUPABASE_AUDIENCE]);

        match decode::<SupabaseClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(JwtError::Expired),
                jsonwebtoken::errors::ErrorKind::InvalidToken => Err(JwtError::Invalid),
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Err(JwtError::Invalid),
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    tracing::warn!("Supabase JWT audience validation failed - rejecting token");
                    Err(JwtError::Invalid)
                }
                _ => Err(JwtError::Validation(e.to_string())),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Token subject is not a user ID")]
    InvalidSubject,
    #[error("Token validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    const SECRET: &str = "test-supabase-secret-at-least-32-characters";

    fn token(sub: &str, aud: &str, exp_offset: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = SupabaseClaims {
            sub: sub.to_string(),
            email: Some("jan@bouwbedrijf.nl".to_string()),
            role: Some("authenticated".to_string()),
            aud: Some(aud.to_string()),
            iat: Some(now),
            exp: now + exp_offset,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let jwt = JwtManager::new(SECRET);
        let user_id = UserId::new();

        let claims = jwt
            .validate_supabase_token(&token(&user_id.to_string(), "authenticated", 3600))
            .unwrap();
        let user = claims.current_user().unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email.as_deref(), Some("jan@bouwbedrijf.nl"));
    }

    #[test]
    fn test_rejects_wrong_audience_and_expired() {
        let jwt = JwtManager::new(SECRET);
        let sub = UserId::new().to_string();

        assert!(matches!(
            jwt.validate_supabase_token(&token(&sub, "anon", 3600)),
            Err(JwtError::Invalid)
        ));
        assert!(matches!(
            jwt.validate_supabase_token(&token(&sub, "authenticated", -3600)),
            Err(JwtError::Expired)
        ));
        assert!(JwtManager::new("another-secret-at-least-32-characters-long")
            .validate_supabase_token(&token(&sub, "authenticated", 3600))
            .is_err());
    }

    #[test]
    fn test_non_uuid_subject() {
        let jwt = JwtManager::new(SECRET);
        let claims = jwt
            .validate_supabase_token(&token("service", "authenticated", 3600))
            .unwrap();
        assert!(matches!(claims.current_user(), Err(JwtError::InvalidSubject)));
    }
}
