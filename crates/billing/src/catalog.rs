//! Price catalog
//!
//! Static, read-only description of everything a user can buy: one-time
//! credit packages and recurring subscription plans. Each entry is keyed by
//! its Stripe price ID. The catalog is built once at startup and shared
//! read-only; a given price ID belongs to at most one of the two variants.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

/// One-time credit top-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditPackage {
    /// Stripe price ID
    pub id: String,
    pub name: String,
    /// Credits granted on successful payment
    pub credits: i64,
    /// Display price, e.g. "€ 45,00"
    pub price: String,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub description: String,
    /// Amount in minor units (euro cents)
    pub amount: i64,
}

/// Recurring plan, optionally with an initial credit grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Stripe price ID
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display price, e.g. "€ 29 /mnd"
    pub price: String,
    #[serde(default)]
    pub popular: bool,
    /// Monthly amount in minor units (euro cents)
    pub amount: i64,
    /// Credits granted with the first payment
    #[serde(default)]
    pub credits: Option<i64>,
}

/// Result of resolving a price ID against the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry<'a> {
    Package(&'a CreditPackage),
    Plan(&'a SubscriptionPlan),
}

impl CatalogEntry<'_> {
    /// Credits to grant when this entry's checkout completes
    pub fn credit_grant(&self) -> Option<i64> {
        match self {
            CatalogEntry::Package(package) => Some(package.credits),
            CatalogEntry::Plan(plan) => plan.credits,
        }
    }

    pub fn is_subscription(&self) -> bool {
        matches!(self, CatalogEntry::Plan(_))
    }

    pub fn name(&self) -> &str {
        match self {
            CatalogEntry::Package(package) => &package.name,
            CatalogEntry::Plan(plan) => &plan.name,
        }
    }
}

/// Immutable catalog of purchasable items
#[derive(Debug, Clone, Serialize)]
pub struct PriceCatalog {
    credit_packages: Vec<CreditPackage>,
    subscription_plans: Vec<SubscriptionPlan>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    credit_packages: Vec<CreditPackage>,
    #[serde(default)]
    subscription_plans: Vec<SubscriptionPlan>,
}

impl PriceCatalog {
    /// Build a catalog, rejecting duplicate price IDs and empty grants
    pub fn new(
        credit_packages: Vec<CreditPackage>,
        subscription_plans: Vec<SubscriptionPlan>,
    ) -> BillingResult<Self> {
        let mut seen = HashSet::new();
        let ids = credit_packages
            .iter()
            .map(|p| p.id.as_str())
            .chain(subscription_plans.iter().map(|p| p.id.as_str()));
        for id in ids {
            if id.trim().is_empty() {
                return Err(BillingError::Config("Empty price ID in catalog".to_string()));
            }
            if !seen.insert(id) {
                return Err(BillingError::Config(format!(
                    "Duplicate price ID in catalog: {}",
                    id
                )));
            }
        }

        if let Some(package) = credit_packages.iter().find(|p| p.credits <= 0) {
            return Err(BillingError::Config(format!(
                "Credit package {} must grant a positive number of credits",
                package.id
            )));
        }
        if let Some(plan) = subscription_plans
            .iter()
            .find(|p| p.credits.is_some_and(|c| c <= 0))
        {
            return Err(BillingError::Config(format!(
                "Subscription plan {} has a non-positive initial credit grant",
                plan.id
            )));
        }

        Ok(Self {
            credit_packages,
            subscription_plans,
        })
    }

    /// Load a catalog from JSON (`credit_packages` / `subscription_plans` arrays)
    pub fn from_json_str(json: &str) -> BillingResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| BillingError::Config(format!("Invalid price catalog: {}", e)))?;
        Self::new(file.credit_packages, file.subscription_plans)
    }

    /// The production catalog
    pub fn builtin() -> Self {
        Self {
            credit_packages: vec![
                CreditPackage {
                    id: "price_1SfQgGKFRd9JfwYZSsiZWosA".to_string(),
                    name: "Noodrantsoen".to_string(),
                    credits: 10,
                    price: "€ 10,00".to_string(),
                    popular: false,
                    description: "Voor de kleine klusjes".to_string(),
                    amount: 1000,
                },
                CreditPackage {
                    id: "price_1SfPuiKFRd9JfwYZxfYqg60H".to_string(),
                    name: "Tankbeurt".to_string(),
                    credits: 45,
                    price: "€ 45,00".to_string(),
                    popular: true,
                    description: "Meest gekozen".to_string(),
                    amount: 4500,
                },
                CreditPackage {
                    id: "price_1SfQgiKFRd9JfwYZyy207Mwe".to_string(),
                    name: "De Voorraad".to_string(),
                    credits: 100,
                    price: "€ 90,00".to_string(),
                    popular: false,
                    description: "Voor de grootverbruiker".to_string(),
                    amount: 9000,
                },
            ],
            subscription_plans: vec![
                SubscriptionPlan {
                    id: "price_1SfQi0KFRd9JfwYZ80ytVcoJ".to_string(),
                    name: "Starter".to_string(),
                    description: "Perfect voor zzp'ers".to_string(),
                    price: "€ 29 /mnd".to_string(),
                    popular: false,
                    amount: 2900,
                    credits: None,
                },
                SubscriptionPlan {
                    id: "price_1SfQiFKFRd9JfwYZlqHczUPR".to_string(),
                    name: "Vakman".to_string(),
                    description: "Voor groeiende bedrijven".to_string(),
                    price: "€ 79 /mnd".to_string(),
                    popular: true,
                    amount: 7900,
                    credits: None,
                },
                SubscriptionPlan {
                    id: "price_1SfQifKFRd9JfwYZDCnKlT2k".to_string(),
                    name: "Aannemer".to_string(),
                    description: "Maximale kracht".to_string(),
                    price: "€ 149 /mnd".to_string(),
                    popular: false,
                    amount: 14900,
                    credits: None,
                },
            ],
        }
    }

    pub fn find_credit_package(&self, price_id: &str) -> Option<&CreditPackage> {
        self.credit_packages.iter().find(|p| p.id == price_id)
    }

    pub fn find_subscription_plan(&self, price_id: &str) -> Option<&SubscriptionPlan> {
        self.subscription_plans.iter().find(|p| p.id == price_id)
    }

    /// Resolve a price ID to exactly one catalog entry
    pub fn resolve(&self, price_id: &str) -> Option<CatalogEntry<'_>> {
        if let Some(plan) = self.find_subscription_plan(price_id) {
            return Some(CatalogEntry::Plan(plan));
        }
        self.find_credit_package(price_id).map(CatalogEntry::Package)
    }

    /// Find a subscription plan by its display name (case-insensitive)
    pub fn find_plan_by_name(&self, name: &str) -> Option<&SubscriptionPlan> {
        let name = name.trim();
        self.subscription_plans
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn credit_packages(&self) -> &[CreditPackage] {
        &self.credit_packages
    }

    pub fn subscription_plans(&self) -> &[SubscriptionPlan] {
        &self.subscription_plans
    }
}

impl Default for PriceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
