//! Credit balance reads

use std::sync::Arc;

use serde::Serialize;

use offertedesk_shared::UserId;

use crate::error::BillingResult;
use crate::ledger::CreditStore;

/// Display ceiling for the credit meter when none is configured
pub const DEFAULT_CREDITS_DISPLAY_MAX: i64 = 50;

/// Balance as shown on the billing page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CreditBalance {
    pub current: i64,
    /// Meter ceiling, not an enforced limit
    pub max: i64,
    /// `current / max` as a percentage, clamped to 0..=100
    pub progress_percent: f64,
}

impl CreditBalance {
    pub fn new(current: i64, max: i64) -> Self {
        let progress_percent = if max > 0 {
            (current as f64 / max as f64 * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            current,
            max,
            progress_percent,
        }
    }
}

#[derive(Clone)]
pub struct BalanceReader {
    store: Arc<dyn CreditStore>,
    display_max: i64,
}

impl BalanceReader {
    pub fn new(store: Arc<dyn CreditStore>, display_max: i64) -> Self {
        Self { store, display_max }
    }

    /// Current balance; a user without a profile row has 0 credits
    pub async fn get_balance(&self, user_id: UserId) -> BillingResult<CreditBalance> {
        let current = self.store.credit_balance(user_id).await?.unwrap_or(0);
        Ok(CreditBalance::new(current, self.display_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBillingStore;

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(CreditBalance::new(60, 50).progress_percent, 100.0);
        assert_eq!(CreditBalance::new(25, 50).progress_percent, 50.0);
        assert_eq!(CreditBalance::new(0, 50).progress_percent, 0.0);
        assert_eq!(CreditBalance::new(10, 0).progress_percent, 0.0);
    }

    #[tokio::test]
    async fn test_missing_profile_reads_as_zero() {
        let reader = BalanceReader::new(
            Arc::new(MemoryBillingStore::new()),
            DEFAULT_CREDITS_DISPLAY_MAX,
        );

        let balance = reader.get_balance(UserId::new()).await.unwrap();
        assert_eq!(balance, CreditBalance { current: 0, max: 50, progress_percent: 0.0 });
    }

    #[tokio::test]
    async fn test_balance_above_ceiling() {
        let store = Arc::new(MemoryBillingStore::new());
        let user = UserId::new();
        store.set_balance(user, 60).await;
        let reader = BalanceReader::new(store, DEFAULT_CREDITS_DISPLAY_MAX);

        let balance = reader.get_balance(user).await.unwrap();
        assert_eq!(balance.current, 60);
        assert_eq!(balance.max, 50);
        assert_eq!(balance.progress_percent, 100.0);
    }
}
