//! Escrow contract client trait and in-memory ledger.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{TokenAmount, TxHash, WalletAddress};

use crate::clients::custody::Signer;
use crate::error::SettlementError;

/// Receipt for a mined escrow transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub tx_hash: TxHash,
}

/// Trait for the on-chain escrow contract.
///
/// Deposits lock a beneficiary's coverage amount; withdrawals release it
/// back out for a payout. Both submit signed transactions and wait for the
/// mined receipt.
#[async_trait]
pub trait EscrowLedgerClient: Send + Sync {
    /// Returns the signer's native-token balance in wei.
    async fn gas_balance(&self, signer: &Signer) -> Result<u128, SettlementError>;

    /// Approves and deposits `amount` of `token` into escrow on behalf of
    /// `beneficiary`; fails with [`SettlementError::ChainReverted`].
    async fn deposit(
        &self,
        signer: &Signer,
        token: &str,
        amount: TokenAmount,
        beneficiary: &WalletAddress,
    ) -> Result<ChainReceipt, SettlementError>;

    /// Withdraws `amount` of `token` from the beneficiary's escrow balance;
    /// fails with [`SettlementError::ChainReverted`].
    async fn withdraw(
        &self,
        signer: &Signer,
        token: &str,
        amount: TokenAmount,
        beneficiary: &WalletAddress,
    ) -> Result<ChainReceipt, SettlementError>;
}

#[derive(Debug)]
struct InMemoryEscrowState {
    /// Escrowed balance per beneficiary address.
    escrowed: HashMap<String, u128>,
    /// Native balance reported for every signer.
    gas_balance: u128,
    fail_on_deposit: bool,
    fail_on_withdraw: bool,
    deposit_count: usize,
    withdraw_count: usize,
    next_tx: u32,
}

impl Default for InMemoryEscrowState {
    fn default() -> Self {
        Self {
            escrowed: HashMap::new(),
            // 1 native token of gas.
            gas_balance: 1_000_000_000_000_000_000,
            fail_on_deposit: false,
            fail_on_withdraw: false,
            deposit_count: 0,
            withdraw_count: 0,
            next_tx: 0,
        }
    }
}

/// In-memory escrow ledger for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscrowLedger {
    state: Arc<RwLock<InMemoryEscrowState>>,
}

impl InMemoryEscrowLedger {
    /// Creates a new in-memory escrow ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the gas balance reported for all signers.
    pub fn set_gas_balance(&self, wei: u128) {
        self.state.write().unwrap().gas_balance = wei;
    }

    /// Configures deposit calls to revert.
    pub fn set_fail_on_deposit(&self, fail: bool) {
        self.state.write().unwrap().fail_on_deposit = fail;
    }

    /// Configures withdraw calls to revert.
    pub fn set_fail_on_withdraw(&self, fail: bool) {
        self.state.write().unwrap().fail_on_withdraw = fail;
    }

    /// Returns the escrowed balance for a beneficiary.
    pub fn escrowed_balance(&self, beneficiary: &WalletAddress) -> u128 {
        self.state
            .read()
            .unwrap()
            .escrowed
            .get(beneficiary.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Returns the number of deposits submitted.
    pub fn deposit_count(&self) -> usize {
        self.state.read().unwrap().deposit_count
    }

    /// Returns the number of withdrawals submitted.
    pub fn withdraw_count(&self) -> usize {
        self.state.read().unwrap().withdraw_count
    }
}

#[async_trait]
impl EscrowLedgerClient for InMemoryEscrowLedger {
    async fn gas_balance(&self, _signer: &Signer) -> Result<u128, SettlementError> {
        Ok(self.state.read().unwrap().gas_balance)
    }

    async fn deposit(
        &self,
        _signer: &Signer,
        _token: &str,
        amount: TokenAmount,
        beneficiary: &WalletAddress,
    ) -> Result<ChainReceipt, SettlementError> {
        let mut state = self.state.write().unwrap();
        state.deposit_count += 1;

        if state.fail_on_deposit {
            return Err(SettlementError::ChainReverted(
                "deposit reverted".to_string(),
            ));
        }

        *state
            .escrowed
            .entry(beneficiary.as_str().to_string())
            .or_insert(0) += amount.units();

        state.next_tx += 1;
        Ok(ChainReceipt {
            tx_hash: TxHash::new(format!("0xdeposit{:04}", state.next_tx)),
        })
    }

    async fn withdraw(
        &self,
        _signer: &Signer,
        _token: &str,
        amount: TokenAmount,
        beneficiary: &WalletAddress,
    ) -> Result<ChainReceipt, SettlementError> {
        let mut state = self.state.write().unwrap();
        state.withdraw_count += 1;

        if state.fail_on_withdraw {
            return Err(SettlementError::ChainReverted(
                "withdraw reverted".to_string(),
            ));
        }

        let balance = state
            .escrowed
            .entry(beneficiary.as_str().to_string())
            .or_insert(0);
        if *balance < amount.units() {
            return Err(SettlementError::ChainReverted(
                "insufficient escrowed balance".to_string(),
            ));
        }
        *balance -= amount.units();

        state.next_tx += 1;
        Ok(ChainReceipt {
            tx_hash: TxHash::new(format!("0xwithdraw{:04}", state.next_tx)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer {
            address: WalletAddress::new("0xsigner"),
        }
    }

    #[tokio::test]
    async fn deposit_then_withdraw_balances() {
        let ledger = InMemoryEscrowLedger::new();
        let wallet = WalletAddress::new("0xabc");
        let amount = TokenAmount::from_units(1_520_000);

        let receipt = ledger
            .deposit(&signer(), "0xtoken", amount, &wallet)
            .await
            .unwrap();
        assert!(receipt.tx_hash.as_str().starts_with("0xdeposit"));
        assert_eq!(ledger.escrowed_balance(&wallet), 1_520_000);

        ledger
            .withdraw(&signer(), "0xtoken", amount, &wallet)
            .await
            .unwrap();
        assert_eq!(ledger.escrowed_balance(&wallet), 0);
    }

    #[tokio::test]
    async fn withdraw_beyond_balance_reverts() {
        let ledger = InMemoryEscrowLedger::new();
        let wallet = WalletAddress::new("0xabc");

        let result = ledger
            .withdraw(&signer(), "0xtoken", TokenAmount::from_units(1), &wallet)
            .await;
        assert!(matches!(result, Err(SettlementError::ChainReverted(_))));
    }

    #[tokio::test]
    async fn gas_balance_knob() {
        let ledger = InMemoryEscrowLedger::new();
        assert!(ledger.gas_balance(&signer()).await.unwrap() > 0);

        ledger.set_gas_balance(0);
        assert_eq!(ledger.gas_balance(&signer()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fail_knobs_revert() {
        let ledger = InMemoryEscrowLedger::new();
        let wallet = WalletAddress::new("0xabc");
        let amount = TokenAmount::from_units(100);

        ledger.set_fail_on_deposit(true);
        assert!(ledger
            .deposit(&signer(), "0xtoken", amount, &wallet)
            .await
            .is_err());
        assert_eq!(ledger.deposit_count(), 1);
    }
}
