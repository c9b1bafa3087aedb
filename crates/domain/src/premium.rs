//! Premium catalog: the products a rider can buy cover for.

use std::collections::BTreeMap;

use common::FiatAmount;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Coverage period for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duration {
    Daily,
    Weekly,
    Monthly,
    Annually,
}

impl Duration {
    /// Returns the duration name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Duration::Daily => "daily",
            Duration::Weekly => "weekly",
            Duration::Monthly => "monthly",
            Duration::Annually => "annually",
        }
    }
}

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Duration {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Duration::Daily),
            "weekly" => Ok(Duration::Weekly),
            "monthly" => Ok(Duration::Monthly),
            "annually" => Ok(Duration::Annually),
            other => Err(DomainError::InvalidDuration(other.to_string())),
        }
    }
}

/// One coverage line item within a premium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub id: String,
    pub name: String,
    pub included: bool,
}

impl Coverage {
    pub fn new(id: impl Into<String>, name: impl Into<String>, included: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            included,
        }
    }
}

/// A purchasable insurance product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Premium {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Weekly base price in fiat.
    pub base_price: FiatAmount,
    pub coverages: Vec<Coverage>,
}

impl Premium {
    /// Flattens the coverage list into the flag map frozen onto a record.
    pub fn coverage_flags(&self) -> BTreeMap<String, bool> {
        self.coverages
            .iter()
            .map(|c| (c.id.clone(), c.included))
            .collect()
    }
}

/// Read-only premium catalog used for purchase validation.
#[derive(Debug, Clone)]
pub struct PremiumCatalog {
    premiums: Vec<Premium>,
}

impl PremiumCatalog {
    /// Creates a catalog from an explicit premium list.
    pub fn new(premiums: Vec<Premium>) -> Self {
        Self { premiums }
    }

    /// The built-in product set.
    pub fn builtin() -> Self {
        Self::new(vec![
            Premium {
                id: "basic-accident".to_string(),
                name: "Basic Accident".to_string(),
                description: "Essential coverage for accidents while riding".to_string(),
                base_price: FiatAmount::from_whole(50),
                coverages: vec![
                    Coverage::new("personal-accident", "Personal Accident", true),
                    Coverage::new("medical-expenses", "Medical Expenses (Limited)", true),
                    Coverage::new("third-party-injury", "Third Party Injury", false),
                    Coverage::new("bike-damage", "Motorcycle Damage", false),
                    Coverage::new("theft-protection", "Theft Protection", false),
                ],
            },
            Premium {
                id: "comprehensive".to_string(),
                name: "Comprehensive".to_string(),
                description: "Full coverage for your motorcycle and yourself".to_string(),
                base_price: FiatAmount::from_whole(150),
                coverages: vec![
                    Coverage::new("personal-accident", "Personal Accident", true),
                    Coverage::new("medical-expenses", "Medical Expenses (Full)", true),
                    Coverage::new("third-party-injury", "Third Party Injury", true),
                    Coverage::new("bike-damage", "Motorcycle Damage", true),
                    Coverage::new("theft-protection", "Theft Protection", true),
                ],
            },
            Premium {
                id: "third-party".to_string(),
                name: "Third Party".to_string(),
                description: "Coverage for damage to others and their property".to_string(),
                base_price: FiatAmount::from_whole(75),
                coverages: vec![
                    Coverage::new("personal-accident", "Personal Accident", false),
                    Coverage::new("medical-expenses", "Medical Expenses", false),
                    Coverage::new("third-party-injury", "Third Party Injury", true),
                    Coverage::new("bike-damage", "Motorcycle Damage", false),
                    Coverage::new("theft-protection", "Theft Protection", false),
                ],
            },
        ])
    }

    /// Looks up a premium by ID.
    pub fn get(&self, premium_id: &str) -> Option<&Premium> {
        self.premiums.iter().find(|p| p.id == premium_id)
    }

    /// All premiums in the catalog.
    pub fn all(&self) -> &[Premium] {
        &self.premiums
    }
}

impl Default for PremiumCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_string_roundtrip() {
        for duration in [
            Duration::Daily,
            Duration::Weekly,
            Duration::Monthly,
            Duration::Annually,
        ] {
            assert_eq!(duration.as_str().parse::<Duration>().unwrap(), duration);
        }
        assert!("fortnightly".parse::<Duration>().is_err());
    }

    #[test]
    fn duration_serializes_lowercase() {
        let json = serde_json::to_string(&Duration::Monthly).unwrap();
        assert_eq!(json, "\"monthly\"");
        let parsed: Duration = serde_json::from_str("\"annually\"").unwrap();
        assert_eq!(parsed, Duration::Annually);
    }

    #[test]
    fn builtin_catalog_has_three_products() {
        let catalog = PremiumCatalog::builtin();
        assert_eq!(catalog.all().len(), 3);
        assert!(catalog.get("basic-accident").is_some());
        assert!(catalog.get("comprehensive").is_some());
        assert!(catalog.get("third-party").is_some());
        assert!(catalog.get("platinum").is_none());
    }

    #[test]
    fn coverage_flags_flatten_by_id() {
        let catalog = PremiumCatalog::builtin();
        let flags = catalog.get("third-party").unwrap().coverage_flags();
        assert_eq!(flags.len(), 5);
        assert_eq!(flags.get("third-party-injury"), Some(&true));
        assert_eq!(flags.get("personal-accident"), Some(&false));
    }

    #[test]
    fn comprehensive_includes_everything() {
        let catalog = PremiumCatalog::builtin();
        let premium = catalog.get("comprehensive").unwrap();
        assert!(premium.coverages.iter().all(|c| c.included));
        assert_eq!(premium.base_price, FiatAmount::from_whole(150));
    }
}
