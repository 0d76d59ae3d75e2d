//! In-memory billing store
//!
//! Same contract as [`PgBillingStore`](crate::ledger::PgBillingStore), backed by
//! a mutex-guarded map. Used by tests and by local runs without a database.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use offertedesk_shared::{CreditLedgerEntry, InvoiceRecord, License, UserId};

use crate::error::{BillingError, BillingResult};
use crate::ledger::{AccountRecords, CreditGrantRequest, CreditStore, GrantOutcome};

#[derive(Default)]
struct Inner {
    balances: HashMap<UserId, i64>,
    ledger: Vec<CreditLedgerEntry>,
    event_ids: HashSet<String>,
    session_ids: HashSet<String>,
    licenses: HashMap<UserId, License>,
    invoices: Vec<InvoiceRecord>,
}

#[derive(Default)]
pub struct MemoryBillingStore {
    inner: Mutex<Inner>,
}

impl MemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile with a starting balance
    pub async fn set_balance(&self, user_id: UserId, credits: i64) {
        self.inner.lock().await.balances.insert(user_id, credits);
    }

    pub async fn set_license(&self, license: License) {
        self.inner
            .lock()
            .await
            .licenses
            .insert(UserId(license.user_id), license);
    }

    pub async fn push_invoice(&self, invoice: InvoiceRecord) {
        self.inner.lock().await.invoices.push(invoice);
    }

    /// Number of ledger entries across all users
    pub async fn ledger_len(&self) -> usize {
        self.inner.lock().await.ledger.len()
    }
}

#[async_trait]
impl CreditStore for MemoryBillingStore {
    async fn apply_grant(&self, grant: &CreditGrantRequest) -> BillingResult<GrantOutcome> {
        let mut inner = self.inner.lock().await;

        let session_seen = grant
            .stripe_session_id
            .as_ref()
            .is_some_and(|id| inner.session_ids.contains(id));
        if inner.event_ids.contains(&grant.stripe_event_id) || session_seen {
            return Ok(GrantOutcome::Duplicate);
        }

        let current = inner.balances.get(&grant.user_id).copied().unwrap_or(0);
        let new_balance = current.checked_add(grant.amount).ok_or_else(|| {
            BillingError::Internal(format!("credit balance overflow for user {}", grant.user_id))
        })?;

        inner.event_ids.insert(grant.stripe_event_id.clone());
        if let Some(session_id) = &grant.stripe_session_id {
            inner.session_ids.insert(session_id.clone());
        }
        inner.balances.insert(grant.user_id, new_balance);

        let entry_id = Uuid::new_v4();
        inner.ledger.push(CreditLedgerEntry {
            id: entry_id,
            user_id: grant.user_id.0,
            amount: grant.amount,
            balance_after: new_balance,
            reason: grant.reason.clone(),
            stripe_event_id: grant.stripe_event_id.clone(),
            stripe_session_id: grant.stripe_session_id.clone(),
            created_at: OffsetDateTime::now_utc(),
        });

        Ok(GrantOutcome::Applied {
            entry_id,
            new_balance,
        })
    }

    async fn credit_balance(&self, user_id: UserId) -> BillingResult<Option<i64>> {
        Ok(self.inner.lock().await.balances.get(&user_id).copied())
    }

    async fn ledger_entries(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> BillingResult<Vec<CreditLedgerEntry>> {
        let inner = self.inner.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(inner
            .ledger
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id.0)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccountRecords for MemoryBillingStore {
    async fn license(&self, user_id: UserId) -> BillingResult<Option<License>> {
        Ok(self.inner.lock().await.licenses.get(&user_id).cloned())
    }

    async fn recent_invoices(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> BillingResult<Vec<InvoiceRecord>> {
        let inner = self.inner.lock().await;
        let mut invoices: Vec<InvoiceRecord> = inner
            .invoices
            .iter()
            .filter(|invoice| invoice.user_id == user_id.0)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        invoices.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(invoices)
    }
}
