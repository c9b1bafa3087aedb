use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a policy record.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// policy IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(Uuid);

impl PolicyId {
    /// Creates a new random policy ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a policy ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PolicyId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<PolicyId> for Uuid {
    fn from(id: PolicyId) -> Self {
        id.0
    }
}

/// Correlation key assigned by the on-ramp/off-ramp provider.
///
/// Links a fiat payment, an on-chain settlement, and a persisted policy
/// record across asynchronous steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order ID from a provider-assigned string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the order ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the order ID is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An already-normalized mobile subscriber number (e.g. `"254712345678"`).
///
/// Normalization and OTP verification are owned by the registration
/// collaborator; the settlement core treats the value as opaque identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Msisdn(String);

impl Msisdn {
    /// Creates an MSISDN from a normalized phone string.
    pub fn new(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    /// Returns the phone number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Msisdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Msisdn {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Msisdn {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Msisdn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A hex-encoded account address on the target chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Creates a wallet address from a hex string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WalletAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A transaction hash of a mined on-chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Creates a transaction hash from a hex string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TxHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TxHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for TxHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error parsing a decimal amount string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountParseError {
    /// The string is not a valid decimal number.
    #[error("Invalid decimal amount: {0:?}")]
    Malformed(String),

    /// The fractional part has more digits than the token supports.
    #[error("Amount {amount:?} exceeds {decimals} decimal places")]
    TooManyDecimals { amount: String, decimals: u8 },

    /// The value does not fit in the amount representation.
    #[error("Amount {0:?} overflows")]
    Overflow(String),
}

/// Fiat money represented in minor units (cents) to avoid floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiatAmount(i64);

impl FiatAmount {
    /// Creates an amount from minor units (cents).
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates an amount from whole currency units (e.g. whole shillings).
    pub fn from_whole(units: i64) -> Self {
        Self(units * 100)
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion.
    pub fn whole_part(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor-unit remainder after whole units.
    pub fn cents_part(&self) -> i64 {
        self.0.abs() % 100
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for FiatAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for FiatAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 < 0 {
            write!(f, "-{}.{:02}", self.whole_part().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.whole_part(), self.cents_part())
        }
    }
}

/// A stablecoin amount in integer base units.
///
/// The number of decimals is a property of the configured token, so
/// conversion to and from decimal strings takes the decimals explicitly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Creates an amount from raw base units.
    pub fn from_units(units: u128) -> Self {
        Self(units)
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the raw base units.
    pub fn units(&self) -> u128 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses a decimal string (e.g. `"1.52"`) into base units for a token
    /// with the given number of decimals.
    pub fn parse_decimal(amount: &str, decimals: u8) -> Result<Self, AmountParseError> {
        let malformed = || AmountParseError::Malformed(amount.to_string());

        let (whole, frac) = match amount.split_once('.') {
            Some((w, f)) => (w, f),
            None => (amount, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(malformed());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) && !whole.is_empty() {
            return Err(malformed());
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        if frac.len() > decimals as usize {
            return Err(AmountParseError::TooManyDecimals {
                amount: amount.to_string(),
                decimals,
            });
        }

        let scale = 10u128.pow(decimals as u32);
        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| malformed())?
        };
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let parsed: u128 = frac.parse().map_err(|_| malformed())?;
            parsed * 10u128.pow((decimals as usize - frac.len()) as u32)
        };

        whole_units
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac_units))
            .map(Self)
            .ok_or_else(|| AmountParseError::Overflow(amount.to_string()))
    }

    /// Formats the amount as a decimal string for a token with the given
    /// number of decimals, trimming trailing fraction zeros.
    pub fn format_units(&self, decimals: u8) -> String {
        let scale = 10u128.pow(decimals as u32);
        let whole = self.0 / scale;
        let frac = self.0 % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{:0width$}", frac, width = decimals as usize);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_id_new_creates_unique_ids() {
        let id1 = PolicyId::new();
        let id2 = PolicyId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn policy_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = PolicyId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn policy_id_serialization_roundtrip() {
        let id = PolicyId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: PolicyId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn order_id_string_conversion() {
        let id = OrderId::new("abc123");
        assert_eq!(id.as_str(), "abc123");
        assert!(!id.is_empty());

        let id2: OrderId = "xyz789".into();
        assert_eq!(id2.as_str(), "xyz789");
    }

    #[test]
    fn order_id_serializes_transparently() {
        let id = OrderId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn msisdn_display() {
        let phone = Msisdn::new("254712345678");
        assert_eq!(phone.to_string(), "254712345678");
    }

    #[test]
    fn fiat_amount_from_whole() {
        let amount = FiatAmount::from_whole(200);
        assert_eq!(amount.cents(), 20000);
        assert_eq!(amount.whole_part(), 200);
        assert_eq!(amount.cents_part(), 0);
    }

    #[test]
    fn fiat_amount_display() {
        assert_eq!(FiatAmount::from_cents(20050).to_string(), "200.50");
        assert_eq!(FiatAmount::from_cents(5).to_string(), "0.05");
        assert_eq!(FiatAmount::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn fiat_amount_comparison() {
        assert!(FiatAmount::from_cents(100).is_positive());
        assert!(FiatAmount::zero().is_zero());
        assert!(!FiatAmount::from_cents(-1).is_positive());
    }

    #[test]
    fn token_amount_parse_whole() {
        let amount = TokenAmount::parse_decimal("152", 6).unwrap();
        assert_eq!(amount.units(), 152_000_000);
    }

    #[test]
    fn token_amount_parse_fractional() {
        let amount = TokenAmount::parse_decimal("1.52", 6).unwrap();
        assert_eq!(amount.units(), 1_520_000);

        let amount = TokenAmount::parse_decimal("0.000001", 6).unwrap();
        assert_eq!(amount.units(), 1);
    }

    #[test]
    fn token_amount_parse_rejects_garbage() {
        assert!(matches!(
            TokenAmount::parse_decimal("12a", 6),
            Err(AmountParseError::Malformed(_))
        ));
        assert!(matches!(
            TokenAmount::parse_decimal("", 6),
            Err(AmountParseError::Malformed(_))
        ));
        assert!(matches!(
            TokenAmount::parse_decimal("1.2345678", 6),
            Err(AmountParseError::TooManyDecimals { .. })
        ));
    }

    #[test]
    fn token_amount_format_units() {
        assert_eq!(TokenAmount::from_units(1_520_000).format_units(6), "1.52");
        assert_eq!(TokenAmount::from_units(152_000_000).format_units(6), "152");
        assert_eq!(TokenAmount::from_units(1).format_units(6), "0.000001");
    }

    #[test]
    fn token_amount_roundtrip() {
        let amount = TokenAmount::parse_decimal("12.345678", 6).unwrap();
        assert_eq!(amount.format_units(6), "12.345678");
    }

    #[test]
    fn tx_hash_serialization() {
        let hash = TxHash::new("0xdeadbeef");
        let json = serde_json::to_string(&hash).unwrap();
        let deserialized: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, deserialized);
    }
}
