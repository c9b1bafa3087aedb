//! The durable policy record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{FiatAmount, Msisdn, OrderId, PolicyId, TokenAmount, TxHash, WalletAddress};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::policy::status::{PolicyStatus, RailStatus};
use crate::premium::{Duration, Premium};

/// A status transition applied to a policy record.
///
/// Every store implementation routes status mutation through
/// [`PolicyRecord::apply`], so the forward-only and set-once invariants are
/// enforced in exactly one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PolicyTransition {
    /// Escrow deposit confirmed; purchase saga terminal success.
    Activated {
        tx_hash: TxHash,
        rail_detail: Option<String>,
    },

    /// Purchase saga terminal failure.
    PurchaseFailed { reason: String },

    /// Claim preconditions passed; claim settlement started.
    ClaimStarted,

    /// Off-ramp payout submitted; claim saga terminal success.
    ClaimSettled,

    /// Claim saga terminal failure.
    ClaimFailed { reason: String },
}

impl PolicyTransition {
    /// The status this transition moves the record to.
    pub fn target(&self) -> PolicyStatus {
        match self {
            PolicyTransition::Activated { .. } => PolicyStatus::Active,
            PolicyTransition::PurchaseFailed { .. } => PolicyStatus::Failed,
            PolicyTransition::ClaimStarted => PolicyStatus::Claiming,
            PolicyTransition::ClaimSettled => PolicyStatus::Claimed,
            PolicyTransition::ClaimFailed { .. } => PolicyStatus::Failed,
        }
    }
}

/// Durable record of one purchase saga, reused by the claim saga.
///
/// Terms (premium, amounts, duration, coverage) are frozen at creation;
/// only status, rail observations, and the chain transaction hash change,
/// and only through [`PolicyRecord::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    id: PolicyId,
    order_id: OrderId,
    phone: Msisdn,
    wallet_address: WalletAddress,
    premium_id: String,
    premium_name: String,
    fiat_amount: FiatAmount,
    crypto_amount: TokenAmount,
    duration: Duration,
    coverage: BTreeMap<String, bool>,
    status: PolicyStatus,
    rail_status: RailStatus,
    /// Rail result description on success; failure reason on a failed saga.
    rail_detail: Option<String>,
    chain_tx_hash: Option<TxHash>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PolicyRecord {
    /// Creates a new Pending record with terms frozen from the premium.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        phone: Msisdn,
        wallet_address: WalletAddress,
        premium: &Premium,
        fiat_amount: FiatAmount,
        crypto_amount: TokenAmount,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PolicyId::new(),
            order_id,
            phone,
            wallet_address,
            premium_id: premium.id.clone(),
            premium_name: premium.name.clone(),
            fiat_amount,
            crypto_amount,
            duration,
            coverage: premium.coverage_flags(),
            status: PolicyStatus::Pending,
            rail_status: RailStatus::Pending,
            rail_detail: None,
            chain_tx_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrates a record from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: PolicyId,
        order_id: OrderId,
        phone: Msisdn,
        wallet_address: WalletAddress,
        premium_id: String,
        premium_name: String,
        fiat_amount: FiatAmount,
        crypto_amount: TokenAmount,
        duration: Duration,
        coverage: BTreeMap<String, bool>,
        status: PolicyStatus,
        rail_status: RailStatus,
        rail_detail: Option<String>,
        chain_tx_hash: Option<TxHash>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            phone,
            wallet_address,
            premium_id,
            premium_name,
            fiat_amount,
            crypto_amount,
            duration,
            coverage,
            status,
            rail_status,
            rail_detail,
            chain_tx_hash,
            created_at,
            updated_at,
        }
    }

    /// Applies a status transition, enforcing the record invariants.
    pub fn apply(&mut self, transition: PolicyTransition) -> Result<(), DomainError> {
        let target = transition.target();
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        match transition {
            PolicyTransition::Activated {
                tx_hash,
                rail_detail,
            } => {
                if self.chain_tx_hash.is_some() {
                    return Err(DomainError::TxHashAlreadySet);
                }
                self.chain_tx_hash = Some(tx_hash);
                self.rail_status = RailStatus::Success;
                self.rail_detail = rail_detail;
            }
            PolicyTransition::PurchaseFailed { reason }
            | PolicyTransition::ClaimFailed { reason } => {
                self.rail_detail = Some(reason);
            }
            PolicyTransition::ClaimStarted | PolicyTransition::ClaimSettled => {}
        }

        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn id(&self) -> PolicyId {
        self.id
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn phone(&self) -> &Msisdn {
        &self.phone
    }

    pub fn wallet_address(&self) -> &WalletAddress {
        &self.wallet_address
    }

    pub fn premium_id(&self) -> &str {
        &self.premium_id
    }

    pub fn premium_name(&self) -> &str {
        &self.premium_name
    }

    pub fn fiat_amount(&self) -> FiatAmount {
        self.fiat_amount
    }

    pub fn crypto_amount(&self) -> TokenAmount {
        self.crypto_amount
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn coverage(&self) -> &BTreeMap<String, bool> {
        &self.coverage
    }

    pub fn status(&self) -> PolicyStatus {
        self.status
    }

    pub fn rail_status(&self) -> RailStatus {
        self.rail_status
    }

    pub fn rail_detail(&self) -> Option<&str> {
        self.rail_detail.as_deref()
    }

    pub fn chain_tx_hash(&self) -> Option<&TxHash> {
        self.chain_tx_hash.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::premium::PremiumCatalog;

    fn pending_record() -> PolicyRecord {
        let catalog = PremiumCatalog::builtin();
        let premium = catalog.get("basic-accident").unwrap();
        PolicyRecord::new(
            OrderId::new("abc123"),
            Msisdn::new("254712345678"),
            WalletAddress::new("0xabc"),
            premium,
            FiatAmount::from_whole(200),
            TokenAmount::from_units(1_520_000),
            Duration::Monthly,
        )
    }

    #[test]
    fn new_record_starts_pending() {
        let record = pending_record();
        assert_eq!(record.status(), PolicyStatus::Pending);
        assert_eq!(record.rail_status(), RailStatus::Pending);
        assert!(record.chain_tx_hash().is_none());
        assert_eq!(record.premium_name(), "Basic Accident");
        assert_eq!(record.coverage().get("personal-accident"), Some(&true));
        assert_eq!(record.coverage().get("theft-protection"), Some(&false));
    }

    #[test]
    fn activation_records_hash_and_rail_success() {
        let mut record = pending_record();
        record
            .apply(PolicyTransition::Activated {
                tx_hash: TxHash::new("0xfeed"),
                rail_detail: Some("The service request is processed successfully.".to_string()),
            })
            .unwrap();

        assert_eq!(record.status(), PolicyStatus::Active);
        assert_eq!(record.rail_status(), RailStatus::Success);
        assert_eq!(record.chain_tx_hash().unwrap().as_str(), "0xfeed");
    }

    #[test]
    fn purchase_failure_records_reason() {
        let mut record = pending_record();
        record
            .apply(PolicyTransition::PurchaseFailed {
                reason: "STK push not confirmed within timeout".to_string(),
            })
            .unwrap();

        assert_eq!(record.status(), PolicyStatus::Failed);
        assert_eq!(
            record.rail_detail(),
            Some("STK push not confirmed within timeout")
        );
    }

    #[test]
    fn status_never_regresses() {
        let mut record = pending_record();
        record
            .apply(PolicyTransition::Activated {
                tx_hash: TxHash::new("0xfeed"),
                rail_detail: None,
            })
            .unwrap();

        let err = record
            .apply(PolicyTransition::PurchaseFailed {
                reason: "late failure".to_string(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: PolicyStatus::Active,
                to: PolicyStatus::Failed,
            }
        ));
        assert_eq!(record.status(), PolicyStatus::Active);
    }

    #[test]
    fn terminal_records_reject_all_transitions() {
        let mut record = pending_record();
        record
            .apply(PolicyTransition::PurchaseFailed {
                reason: "timeout".to_string(),
            })
            .unwrap();

        for transition in [
            PolicyTransition::Activated {
                tx_hash: TxHash::new("0x1"),
                rail_detail: None,
            },
            PolicyTransition::ClaimStarted,
            PolicyTransition::ClaimSettled,
        ] {
            assert!(record.apply(transition).is_err());
        }
        assert_eq!(record.status(), PolicyStatus::Failed);
        assert_eq!(record.rail_detail(), Some("timeout"));
    }

    #[test]
    fn claim_lifecycle() {
        let mut record = pending_record();
        record
            .apply(PolicyTransition::Activated {
                tx_hash: TxHash::new("0xfeed"),
                rail_detail: None,
            })
            .unwrap();

        record.apply(PolicyTransition::ClaimStarted).unwrap();
        assert_eq!(record.status(), PolicyStatus::Claiming);

        record.apply(PolicyTransition::ClaimSettled).unwrap();
        assert_eq!(record.status(), PolicyStatus::Claimed);
        // The deposit hash is not overwritten by the claim.
        assert_eq!(record.chain_tx_hash().unwrap().as_str(), "0xfeed");
    }

    #[test]
    fn claim_cannot_start_from_pending() {
        let mut record = pending_record();
        assert!(record.apply(PolicyTransition::ClaimStarted).is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let record = pending_record();
        let json = serde_json::to_string(&record).unwrap();
        let deserialized: PolicyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }
}
