//! Common types used across Offertedesk

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// User ID wrapper
///
/// Issued by the authentication provider (the JWT `sub` claim) and immutable
/// for the lifetime of the account. Every row in the system is scoped by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn new(id: UserId, email: Option<String>) -> Self {
        Self { id, email }
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// One row per user. `credits` is only ever written by the credit ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub credits: i64,
    pub phone_number: Option<String>,
    pub kvk_number: Option<String>,
    pub vat_number: Option<String>,
    pub pdf_settings: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Licenses & invoices
// =============================================================================

/// Optional plan record for a user; absence means the free plan
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct License {
    pub user_id: Uuid,
    pub plan: Option<String>,
    pub status: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
}

/// Invoice history row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
}

// =============================================================================
// Credit ledger
// =============================================================================

/// Append-only record of one applied credit grant
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: String,
    pub stripe_event_id: String,
    pub stripe_session_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Quotes
// =============================================================================

/// Lifecycle of a quote ("offerte"). Stored as lowercase Dutch labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Concept,
    Verzonden,
    Geaccepteerd,
    Afgewezen,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Verzonden => "verzonden",
            Self::Geaccepteerd => "geaccepteerd",
            Self::Afgewezen => "afgewezen",
        }
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "concept" => Ok(Self::Concept),
            "verzonden" => Ok(Self::Verzonden),
            "geaccepteerd" => Ok(Self::Geaccepteerd),
            "afgewezen" => Ok(Self::Afgewezen),
            _ => Err(format!("Invalid quote status: {}", s)),
        }
    }
}

/// Quote row as read by the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub status: String,
    pub total_cents: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub scheduled_for: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parse_and_display() {
        let raw = "6f1c2b1e-3d4a-4a59-9d1e-0b6c3f0a7e21";
        let id: UserId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);

        let padded: UserId = format!("  {}  ", raw).parse().unwrap();
        assert_eq!(padded, id);

        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn test_user_id_serializes_transparently() {
        let id = UserId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn test_quote_status_roundtrip() {
        for status in [
            QuoteStatus::Concept,
            QuoteStatus::Verzonden,
            QuoteStatus::Geaccepteerd,
            QuoteStatus::Afgewezen,
        ] {
            assert_eq!(status.as_str().parse::<QuoteStatus>().unwrap(), status);
        }
        assert_eq!("Verzonden".parse::<QuoteStatus>().unwrap(), QuoteStatus::Verzonden);
        assert!("betaald".parse::<QuoteStatus>().is_err());
    }
}
