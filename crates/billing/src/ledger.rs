//! Credit ledger
//!
//! Every credit grant is recorded as an append-only ledger entry keyed by the
//! Stripe event ID (and checkout session ID). The entry insert and the balance
//! increment happen in one transaction, so a redelivered or concurrently
//! delivered event can never credit the same purchase twice.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use offertedesk_shared::{begin_user_scope, CreditLedgerEntry, InvoiceRecord, License, UserId};

use crate::error::BillingResult;

/// A grant to apply, as decoded from a completed checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrantRequest {
    pub user_id: UserId,
    pub amount: i64,
    pub stripe_event_id: String,
    pub stripe_session_id: Option<String>,
    pub reason: String,
}

/// What happened to a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// First delivery: the balance was incremented
    Applied { entry_id: Uuid, new_balance: i64 },
    /// The event or session was already applied; nothing changed
    Duplicate,
}

/// Privileged access to the credit balance and its ledger
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Record the grant and increment the balance, at most once per event/session
    async fn apply_grant(&self, grant: &CreditGrantRequest) -> BillingResult<GrantOutcome>;

    /// Current balance; `None` when the user has no profile row
    async fn credit_balance(&self, user_id: UserId) -> BillingResult<Option<i64>>;

    /// Most recent ledger entries, newest first
    async fn ledger_entries(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> BillingResult<Vec<CreditLedgerEntry>>;
}

/// Read access to plan and invoice rows for the billing overview
#[async_trait]
pub trait AccountRecords: Send + Sync {
    async fn license(&self, user_id: UserId) -> BillingResult<Option<License>>;

    async fn recent_invoices(&self, user_id: UserId, limit: i64)
        -> BillingResult<Vec<InvoiceRecord>>;
}

/// Postgres-backed billing store
///
/// `pool` serves user-scoped reads, each inside a transaction acting as that
/// user so the row-level policies apply. `service_pool` connects with the
/// service-role credential and is only used to apply webhook grants.
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
    service_pool: PgPool,
}

impl PgBillingStore {
    pub fn new(pool: PgPool, service_pool: PgPool) -> Self {
        Self { pool, service_pool }
    }
}

#[async_trait]
impl CreditStore for PgBillingStore {
    async fn apply_grant(&self, grant: &CreditGrantRequest) -> BillingResult<GrantOutcome> {
        let mut tx = self.service_pool.begin().await?;

        // Claim the event. A conflict on either Stripe key means it was already applied.
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO credit_ledger (user_id, amount, balance_after, reason, stripe_event_id, stripe_session_id)
            VALUES ($1, $2, 0, $3, $4, $5)
            ON CONFLICT DO NOTHING
            RETURNING id
            "#,
        )
        .bind(grant.user_id.0)
        .bind(grant.amount)
        .bind(&grant.reason)
        .bind(&grant.stripe_event_id)
        .bind(&grant.stripe_session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((entry_id,)) = claimed else {
            tx.rollback().await?;
            return Ok(GrantOutcome::Duplicate);
        };

        let (new_balance,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO profiles (id, credits)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
                SET credits = profiles.credits + EXCLUDED.credits,
                    updated_at = NOW()
            RETURNING credits
            "#,
        )
        .bind(grant.user_id.0)
        .bind(grant.amount)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE credit_ledger SET balance_after = $1 WHERE id = $2")
            .bind(new_balance)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(GrantOutcome::Applied {
            entry_id,
            new_balance,
        })
    }

    async fn credit_balance(&self, user_id: UserId) -> BillingResult<Option<i64>> {
        let mut tx = begin_user_scope(&self.pool, user_id).await?;
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT credits FROM profiles WHERE id = $1")
                .bind(user_id.0)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(row.and_then(|(credits,)| credits))
    }

    async fn ledger_entries(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> BillingResult<Vec<CreditLedgerEntry>> {
        let mut tx = begin_user_scope(&self.pool, user_id).await?;
        let entries = sqlx::query_as::<_, CreditLedgerEntry>(
            r#"
            SELECT id, user_id, amount, balance_after, reason, stripe_event_id, stripe_session_id, created_at
            FROM credit_ledger
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.0)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(entries)
    }
}

#[async_trait]
impl AccountRecords for PgBillingStore {
    async fn license(&self, user_id: UserId) -> BillingResult<Option<License>> {
        let mut tx = begin_user_scope(&self.pool, user_id).await?;
        let license = sqlx::query_as::<_, License>(
            "SELECT user_id, plan, status, ends_at FROM licenses WHERE user_id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(license)
    }

    async fn recent_invoices(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> BillingResult<Vec<InvoiceRecord>> {
        let mut tx = begin_user_scope(&self.pool, user_id).await?;
        let invoices = sqlx::query_as::<_, InvoiceRecord>(
            r#"
            SELECT id, user_id, invoice_number, issued_at, amount_cents, currency, status
            FROM invoices
            WHERE user_id = $1
            ORDER BY issued_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.0)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(invoices)
    }
}
