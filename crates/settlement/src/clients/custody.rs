//! Key custody seam producing transaction signers for managed wallets.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::WalletAddress;

use crate::error::SettlementError;

/// A signer able to submit transactions for one managed wallet.
///
/// Key material stays inside the custody collaborator; the saga only ever
/// sees the signing address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    pub address: WalletAddress,
}

/// Trait for resolving a managed wallet into a usable signer.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Produces a signer for the wallet; fails with
    /// [`SettlementError::Custody`] when key material cannot be recovered.
    async fn signer_for(&self, wallet: &WalletAddress) -> Result<Signer, SettlementError>;
}

#[derive(Debug, Default)]
struct InMemoryCustodyState {
    fail_on_decrypt: bool,
    signer_count: usize,
}

/// In-memory custody that signs for any wallet.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyCustody {
    state: Arc<RwLock<InMemoryCustodyState>>,
}

impl InMemoryKeyCustody {
    /// Creates a new in-memory custody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures key recovery to fail.
    pub fn set_fail_on_decrypt(&self, fail: bool) {
        self.state.write().unwrap().fail_on_decrypt = fail;
    }

    /// Returns the number of signers produced.
    pub fn signer_count(&self) -> usize {
        self.state.read().unwrap().signer_count
    }
}

#[async_trait]
impl KeyCustody for InMemoryKeyCustody {
    async fn signer_for(&self, wallet: &WalletAddress) -> Result<Signer, SettlementError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_decrypt {
            return Err(SettlementError::Custody(
                "failed to recover key material".to_string(),
            ));
        }

        state.signer_count += 1;
        Ok(Signer {
            address: wallet.clone(),
        })
    }
}
