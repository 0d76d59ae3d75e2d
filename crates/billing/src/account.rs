//! Billing overview for the account page
//!
//! Combines the credit balance, the active plan and the invoice history into
//! one read model, with amounts and dates already formatted for Dutch display.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use offertedesk_shared::{CreditLedgerEntry, InvoiceRecord, License, UserId};

use crate::balance::{BalanceReader, CreditBalance};
use crate::catalog::PriceCatalog;
use crate::error::BillingResult;
use crate::ledger::{AccountRecords, CreditStore};

/// Invoices shown on the overview
pub const RECENT_INVOICE_LIMIT: i64 = 12;

const FREE_PLAN_NAME: &str = "Gratis";
const FREE_PLAN_PRICE: &str = "€ 0";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanInfo {
    pub name: String,
    pub status: String,
    pub price: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
}

impl PlanInfo {
    fn free() -> Self {
        Self {
            name: FREE_PLAN_NAME.to_string(),
            status: "free".to_string(),
            price: FREE_PLAN_PRICE.to_string(),
            ends_at: None,
        }
    }

    fn from_license(license: License, catalog: &PriceCatalog) -> Self {
        let name = license
            .plan
            .filter(|plan| !plan.trim().is_empty())
            .unwrap_or_else(|| FREE_PLAN_NAME.to_string());
        let price = catalog
            .find_plan_by_name(&name)
            .map(|plan| plan.price.clone())
            .unwrap_or_else(|| FREE_PLAN_PRICE.to_string());

        Self {
            name,
            status: license.status.unwrap_or_else(|| "inactive".to_string()),
            price,
            ends_at: license.ends_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub number: String,
    /// dd-mm-yyyy
    pub date: String,
    pub amount: String,
    pub status: String,
}

impl From<&InvoiceRecord> for InvoiceSummary {
    fn from(invoice: &InvoiceRecord) -> Self {
        Self {
            number: invoice.invoice_number.clone(),
            date: format_date(invoice.issued_at),
            amount: format_euro(invoice.amount_cents),
            status: invoice_status_label(&invoice.status).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingOverview {
    pub credits: CreditBalance,
    pub plan: PlanInfo,
    pub invoices: Vec<InvoiceSummary>,
}

/// Format minor units as a Dutch euro amount: `125000` becomes `€ 1.250,00`
pub fn format_euro(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let euros = (cents / 100).to_string();

    let mut grouped = String::with_capacity(euros.len() + euros.len() / 3);
    for (i, digit) in euros.chars().enumerate() {
        if i > 0 && (euros.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("€ {}{},{:02}", sign, grouped, cents % 100)
}

fn format_date(at: OffsetDateTime) -> String {
    format!("{:02}-{:02}-{}", at.day(), u8::from(at.month()), at.year())
}

/// Dutch label for a Stripe invoice status
pub fn invoice_status_label(status: &str) -> &str {
    match status {
        "paid" => "Betaald",
        "open" => "Openstaand",
        "draft" => "Concept",
        "void" => "Geannuleerd",
        "uncollectible" => "Oninbaar",
        other => other,
    }
}

#[derive(Clone)]
pub struct AccountService {
    records: Arc<dyn AccountRecords>,
    credits: Arc<dyn CreditStore>,
    balance: BalanceReader,
    catalog: Arc<PriceCatalog>,
}

impl AccountService {
    pub fn new(
        records: Arc<dyn AccountRecords>,
        credits: Arc<dyn CreditStore>,
        balance: BalanceReader,
        catalog: Arc<PriceCatalog>,
    ) -> Self {
        Self {
            records,
            credits,
            balance,
            catalog,
        }
    }

    pub async fn billing_overview(&self, user_id: UserId) -> BillingResult<BillingOverview> {
        let credits = self.balance.get_balance(user_id).await?;

        let plan = match self.records.license(user_id).await? {
            Some(license) => PlanInfo::from_license(license, &self.catalog),
            None => PlanInfo::free(),
        };

        let invoices = self
            .records
            .recent_invoices(user_id, RECENT_INVOICE_LIMIT)
            .await?
            .iter()
            .map(InvoiceSummary::from)
            .collect();

        Ok(BillingOverview {
            credits,
            plan,
            invoices,
        })
    }

    /// Most recent credit grants, newest first
    pub async fn ledger_history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> BillingResult<Vec<CreditLedgerEntry>> {
        self.credits.ledger_entries(user_id, limit.clamp(1, 100)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::DEFAULT_CREDITS_DISPLAY_MAX;
    use crate::ledger::CreditGrantRequest;
    use crate::memory::MemoryBillingStore;
    use time::macros::datetime;
    use uuid::Uuid;

    fn service(store: Arc<MemoryBillingStore>) -> AccountService {
        AccountService::new(
            store.clone(),
            store.clone(),
            BalanceReader::new(store, DEFAULT_CREDITS_DISPLAY_MAX),
            Arc::new(PriceCatalog::builtin()),
        )
    }

    fn invoice(user_id: UserId, number: &str, issued_at: OffsetDateTime) -> InvoiceRecord {
        InvoiceRecord {
            id: Uuid::new_v4(),
            user_id: user_id.0,
            invoice_number: number.to_string(),
            issued_at,
            amount_cents: 2900,
            currency: "eur".to_string(),
            status: "paid".to_string(),
        }
    }

    #[test]
    fn test_format_euro() {
        assert_eq!(format_euro(0), "€ 0,00");
        assert_eq!(format_euro(2900), "€ 29,00");
        assert_eq!(format_euro(125_000), "€ 1.250,00");
        assert_eq!(format_euro(123_456_789), "€ 1.234.567,89");
        assert_eq!(format_euro(-1250), "€ -12,50");
    }

    #[test]
    fn test_invoice_summary() {
        let summary = InvoiceSummary::from(&invoice(
            UserId::new(),
            "INV-2024-001",
            datetime!(2024-12-01 09:30 UTC),
        ));
        assert_eq!(summary.date, "01-12-2024");
        assert_eq!(summary.amount, "€ 29,00");
        assert_eq!(summary.status, "Betaald");
        assert_eq!(invoice_status_label("refunded"), "refunded");
    }

    #[tokio::test]
    async fn test_overview_without_license_is_free_plan() {
        let store = Arc::new(MemoryBillingStore::new());
        let overview = service(store).billing_overview(UserId::new()).await.unwrap();

        assert_eq!(overview.plan, PlanInfo::free());
        assert_eq!(overview.plan.name, "Gratis");
        assert_eq!(overview.plan.price, "€ 0");
        assert_eq!(overview.credits.current, 0);
        assert!(overview.invoices.is_empty());
    }

    #[tokio::test]
    async fn test_overview_with_license_and_invoices() {
        let store = Arc::new(MemoryBillingStore::new());
        let user = UserId::new();
        store.set_balance(user, 20).await;
        store
            .set_license(License {
                user_id: user.0,
                plan: Some("Vakman".to_string()),
                status: None,
                ends_at: None,
            })
            .await;
        for month in 1..=12u8 {
            let issued = datetime!(2024-01-01 0:00 UTC)
                .replace_month(time::Month::try_from(month).unwrap())
                .unwrap();
            store.push_invoice(invoice(user, &format!("INV-{}", month), issued)).await;
        }
        store
            .push_invoice(invoice(user, "INV-LATEST", datetime!(2025-01-01 0:00 UTC)))
            .await;

        let overview = service(store).billing_overview(user).await.unwrap();

        assert_eq!(overview.plan.name, "Vakman");
        assert_eq!(overview.plan.status, "inactive");
        assert_eq!(overview.plan.price, "€ 79 /mnd");
        assert_eq!(overview.credits.progress_percent, 40.0);
        assert_eq!(overview.invoices.len(), 12);
        assert_eq!(overview.invoices[0].number, "INV-LATEST");
    }

    #[tokio::test]
    async fn test_unknown_plan_name_has_no_price() {
        let store = Arc::new(MemoryBillingStore::new());
        let user = UserId::new();
        store
            .set_license(License {
                user_id: user.0,
                plan: Some("pro".to_string()),
                status: Some("active".to_string()),
                ends_at: None,
            })
            .await;

        let plan = service(store).billing_overview(user).await.unwrap().plan;
        assert_eq!(plan.name, "pro");
        assert_eq!(plan.status, "active");
        assert_eq!(plan.price, "€ 0");
    }

    #[tokio::test]
    async fn test_ledger_history() {
        let store = Arc::new(MemoryBillingStore::new());
        let user = UserId::new();
        store
            .apply_grant(&CreditGrantRequest {
                user_id: user,
                amount: 45,
                stripe_event_id: "evt_1".to_string(),
                stripe_session_id: Some("cs_1".to_string()),
                reason: "checkout.session.completed".to_string(),
            })
            .await
            .unwrap();

        let history = service(store).ledger_history(user, 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 45);
    }
}
