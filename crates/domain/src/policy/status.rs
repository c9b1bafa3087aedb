//! Policy status machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of a policy in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Active ──► Claiming ──┬──► Claimed
///           │                          │
///           └──────────────────────────┴──► Failed
/// ```
///
/// Status only ever moves forward along these edges; `Claimed` and `Failed`
/// are terminal. `Active` ends the purchase saga but remains claimable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PolicyStatus {
    /// Purchase accepted, settlement in flight.
    #[default]
    Pending,

    /// Escrow deposit confirmed; the policy is in force.
    Active,

    /// A claim is being settled against the policy.
    Claiming,

    /// The escrowed funds were paid out (terminal state).
    Claimed,

    /// Settlement could not complete (terminal state).
    Failed,
}

impl PolicyStatus {
    /// Returns true if `next` is a legal forward edge from this status.
    pub fn can_transition_to(&self, next: PolicyStatus) -> bool {
        matches!(
            (self, next),
            (PolicyStatus::Pending, PolicyStatus::Active)
                | (PolicyStatus::Pending, PolicyStatus::Failed)
                | (PolicyStatus::Active, PolicyStatus::Claiming)
                | (PolicyStatus::Claiming, PolicyStatus::Claimed)
                | (PolicyStatus::Claiming, PolicyStatus::Failed)
        )
    }

    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PolicyStatus::Claimed | PolicyStatus::Failed)
    }

    /// Returns true if the policy still occupies its natural key — a second
    /// purchase of the same premium by the same owner conflicts while any
    /// record for the pair is open.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if a claim may be started from this status.
    pub fn can_claim(&self) -> bool {
        matches!(self, PolicyStatus::Active)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Pending => "Pending",
            PolicyStatus::Active => "Active",
            PolicyStatus::Claiming => "Claiming",
            PolicyStatus::Claimed => "Claimed",
            PolicyStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PolicyStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PolicyStatus::Pending),
            "Active" => Ok(PolicyStatus::Active),
            "Claiming" => Ok(PolicyStatus::Claiming),
            "Claimed" => Ok(PolicyStatus::Claimed),
            "Failed" => Ok(PolicyStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// Last observed state of the fiat push-payment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RailStatus {
    /// Push payment initiated, confirmation not yet observed.
    #[default]
    Pending,

    /// The rail confirmed the payment.
    Success,

    /// The rail reported a definitive failure.
    Failed,
}

impl RailStatus {
    /// Returns the rail status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RailStatus::Pending => "Pending",
            RailStatus::Success => "Success",
            RailStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RailStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RailStatus::Pending),
            "Success" => Ok(RailStatus::Success),
            "Failed" => Ok(RailStatus::Failed),
            other => Err(DomainError::UnknownRailStatus(other.to_string())),
        }
    }
}
