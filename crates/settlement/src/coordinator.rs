//! Settlement saga orchestrating purchase and claim flows.

use std::future::Future;
use std::sync::Arc;

use common::{FiatAmount, Msisdn, OrderId, PolicyId, TokenAmount, TxHash, WalletAddress};
use domain::{
    PolicyRecord, PolicyStatus, PolicyStore, PolicyTransition, Premium, PremiumCatalog,
};
use serde::{Deserialize, Serialize};

use crate::clients::{
    EscrowLedgerClient, FiatRailClient, KeyCustody, OffRampClient, OnRampClient, OrderStatus,
    QuoteAmount, QuoteClient, QuoteDirection, Ticket, TicketSide, TicketingClient,
};
use crate::config::SettlementConfig;
use crate::error::{Result, SettlementError};
use crate::lease::OrderLeases;
use crate::poll::{poll_until, PollOutcome, PollResult};
use crate::retry::{Backoff, RetryPolicy};

/// A validated purchase request.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub phone: Msisdn,
    /// Managed wallet linked to the subscriber; absent when registration
    /// has not provisioned one yet.
    pub wallet_address: Option<WalletAddress>,
    pub fiat_amount: FiatAmount,
    pub premium_id: String,
    pub duration: String,
}

/// Synchronous acknowledgement of an accepted purchase.
///
/// Settlement continues in the background; callers follow up with status
/// queries keyed by the order ID.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseAccepted {
    pub order_id: OrderId,
    pub crypto_amount: TokenAmount,
}

/// A claim request against an active policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub policy_id: PolicyId,
    pub phone: Msisdn,
}

/// Receipt for a settled claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    pub tx_hash: TxHash,
    pub explorer_link: String,
    pub payout_order_id: OrderId,
}

/// Point-in-time view of one policy's settlement progress.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyStatusView {
    pub status: PolicyStatus,
    pub transaction_hash: Option<TxHash>,
    pub explorer_link: Option<String>,
}

/// Orchestrates the purchase and claim settlement sagas.
///
/// The purchase path splits at the fiat rail: everything up to and
/// including push-payment initiation runs synchronously and either rejects
/// the request or persists a Pending record, while confirmation polling,
/// on-ramp settlement, and the escrow deposit run as a background task
/// holding the order's exclusive lease. The claim path is fully
/// synchronous.
pub struct SettlementSaga<St, Q, R, O, E, F, T, K>
where
    St: PolicyStore,
    Q: QuoteClient,
    R: FiatRailClient,
    O: OnRampClient,
    E: EscrowLedgerClient,
    F: OffRampClient,
    T: TicketingClient,
    K: KeyCustody,
{
    store: St,
    catalog: PremiumCatalog,
    quote: Q,
    rail: R,
    onramp: O,
    escrow: E,
    offramp: F,
    ticketing: T,
    custody: K,
    config: SettlementConfig,
    leases: OrderLeases,
}

impl<St, Q, R, O, E, F, T, K> SettlementSaga<St, Q, R, O, E, F, T, K>
where
    St: PolicyStore,
    Q: QuoteClient,
    R: FiatRailClient,
    O: OnRampClient,
    E: EscrowLedgerClient,
    F: OffRampClient,
    T: TicketingClient,
    K: KeyCustody,
{
    /// Creates a new settlement saga over the given store and providers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: St,
        catalog: PremiumCatalog,
        quote: Q,
        rail: R,
        onramp: O,
        escrow: E,
        offramp: F,
        ticketing: T,
        custody: K,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            quote,
            rail,
            onramp,
            escrow,
            offramp,
            ticketing,
            custody,
            config,
            leases: OrderLeases::new(),
        }
    }

    /// The premium catalog backing purchase validation.
    pub fn premiums(&self) -> &[Premium] {
        self.catalog.all()
    }

    /// Runs the synchronous leg of the purchase saga: validation, quote,
    /// push-payment initiation, and persistence of the Pending record.
    ///
    /// On success the caller acks the subscriber and dispatches the
    /// background leg with [`SettlementSaga::dispatch_purchase`].
    #[tracing::instrument(skip(self, request), fields(premium_id = %request.premium_id))]
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseAccepted> {
        metrics::counter!("purchase_requests_total").increment(1);

        let duration = request.duration.parse().map_err(|_| {
            SettlementError::Validation(format!("unknown duration {:?}", request.duration))
        })?;
        let premium = self
            .catalog
            .get(&request.premium_id)
            .ok_or_else(|| SettlementError::UnknownPremium(request.premium_id.clone()))?;
        let wallet = request.wallet_address.ok_or_else(|| {
            SettlementError::Precondition(format!(
                "no wallet is linked to subscriber {}",
                request.phone
            ))
        })?;
        if !request.fiat_amount.is_positive() {
            return Err(SettlementError::Validation(format!(
                "amount must be positive, got {}",
                request.fiat_amount
            )));
        }

        let quote = self
            .call(
                "quote",
                self.quote
                    .quote(QuoteDirection::OnRamp, QuoteAmount::Fiat(request.fiat_amount)),
            )
            .await?;

        let rail_policy = RetryPolicy::new(
            self.config.rail_retry_attempts,
            Backoff::Fixed(self.config.rail_retry_delay),
        );
        let initiation = rail_policy
            .run(
                |attempt| {
                    tracing::debug!(attempt, "initiating push payment");
                    self.call(
                        "initiate_payment",
                        self.rail.initiate(&request.phone, request.fiat_amount, &wallet),
                    )
                },
                |_| true,
            )
            .await?;

        let record = PolicyRecord::new(
            initiation.order_id.clone(),
            request.phone,
            wallet,
            premium,
            request.fiat_amount,
            quote.crypto_amount,
            duration,
        );
        self.store.create(record).await?;

        metrics::counter!("purchases_accepted_total").increment(1);
        tracing::info!(order_id = %initiation.order_id, "purchase accepted, awaiting settlement");

        Ok(PurchaseAccepted {
            order_id: initiation.order_id,
            crypto_amount: quote.crypto_amount,
        })
    }

    /// Spawns the background settlement leg for an accepted purchase.
    ///
    /// Errors inside the task are logged; the durable record is the source
    /// of truth for the outcome.
    pub fn dispatch_purchase(self: &Arc<Self>, order_id: OrderId)
    where
        St: 'static,
        Q: 'static,
        R: 'static,
        O: 'static,
        E: 'static,
        F: 'static,
        T: 'static,
        K: 'static,
    {
        let saga = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = saga.run_purchase(&order_id).await {
                tracing::error!(%order_id, error = %err, "settlement task failed");
            }
        });
    }

    /// Runs the background leg of the purchase saga under the order's
    /// exclusive lease and returns the terminal status it reached.
    ///
    /// A record that already left Pending is returned as-is, so a duplicate
    /// dispatch after the lease was released is harmless.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn run_purchase(&self, order_id: &OrderId) -> Result<PolicyStatus> {
        let _lease = self
            .leases
            .acquire(order_id)
            .ok_or_else(|| SettlementError::SagaInFlight(order_id.to_string()))?;

        let record = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| SettlementError::PolicyNotFound(order_id.to_string()))?;
        if record.status() != PolicyStatus::Pending {
            tracing::warn!(status = %record.status(), "settlement already concluded");
            return Ok(record.status());
        }

        let started = std::time::Instant::now();
        match self.settle_purchase(&record).await {
            Ok((tx_hash, rail_detail)) => {
                self.store
                    .update_status(
                        order_id,
                        PolicyTransition::Activated {
                            tx_hash: tx_hash.clone(),
                            rail_detail,
                        },
                    )
                    .await?;

                metrics::counter!("policies_activated_total").increment(1);
                metrics::histogram!("settlement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(tx_hash = %tx_hash, "policy activated");
                Ok(PolicyStatus::Active)
            }
            Err(err) => {
                let reason = err.to_string();
                if let Err(store_err) = self
                    .store
                    .update_status(order_id, PolicyTransition::PurchaseFailed { reason })
                    .await
                {
                    tracing::error!(error = %store_err, "failed to record settlement failure");
                }
                self.file_onramp_ticket(&record, &err).await;

                metrics::counter!("settlements_failed_total").increment(1);
                metrics::histogram!("settlement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::warn!(error = %err, "settlement failed");
                Ok(PolicyStatus::Failed)
            }
        }
    }

    /// Confirmation poll, on-ramp settlement, and escrow deposit.
    ///
    /// Returns the deposit transaction hash and the rail's result
    /// description.
    async fn settle_purchase(
        &self,
        record: &PolicyRecord,
    ) -> Result<(TxHash, Option<String>)> {
        let confirmation = poll_until(
            self.config.poll_interval,
            self.config.poll_max_attempts,
            |attempt| async move {
                tracing::debug!(attempt, "checking payment status");
                match self
                    .call("order_status", self.onramp.order_status(record.order_id()))
                    .await
                {
                    Ok(report) => match report.status {
                        OrderStatus::Success => PollOutcome::Ready(report),
                        OrderStatus::Pending => PollOutcome::Pending,
                        OrderStatus::Failed => {
                            PollOutcome::Abort(SettlementError::RailFailed(
                                report
                                    .detail
                                    .unwrap_or_else(|| "payment failed".to_string()),
                            ))
                        }
                    },
                    Err(err) => PollOutcome::Abort(err),
                }
            },
        )
        .await;

        let report = match confirmation {
            PollResult::Ready(report) => report,
            PollResult::Aborted(err) => return Err(err),
            PollResult::TimedOut { attempts } => {
                return Err(SettlementError::ConfirmationTimeout { attempts });
            }
        };

        // Exchange-rate movement between quote and settlement is the one
        // failure the provider asks callers to retry.
        let settle_policy = RetryPolicy::new(
            self.config.settle_retry_attempts,
            Backoff::Linear(self.config.settle_backoff_step),
        );
        let receipt = settle_policy
            .run(
                |attempt| {
                    tracing::debug!(attempt, "settling on-ramp order");
                    self.call(
                        "settle",
                        self.onramp.settle(record.wallet_address(), record.order_id()),
                    )
                },
                SettlementError::is_exchange_rate_transient,
            )
            .await?;
        tracing::info!(onramp_tx = %receipt.tx_hash, "on-ramp settled");

        let signer = self
            .call("signer_for", self.custody.signer_for(record.wallet_address()))
            .await?;
        let gas = self
            .call("gas_balance", self.escrow.gas_balance(&signer))
            .await?;
        if gas == 0 {
            return Err(SettlementError::InsufficientGas(format!(
                "signer {} cannot fund the escrow deposit",
                signer.address
            )));
        }

        let deposit = self
            .call(
                "escrow_deposit",
                self.escrow.deposit(
                    &signer,
                    &self.config.chain.token_address,
                    record.crypto_amount(),
                    record.wallet_address(),
                ),
            )
            .await?;

        Ok((deposit.tx_hash, report.detail))
    }

    /// Runs the claim saga synchronously: precondition checks, escrow
    /// withdrawal, and off-ramp payout submission.
    #[tracing::instrument(skip(self, request), fields(policy_id = %request.policy_id))]
    pub async fn claim(&self, request: ClaimRequest) -> Result<ClaimReceipt> {
        metrics::counter!("claim_requests_total").increment(1);

        let record = self
            .store
            .find_by_id(&request.policy_id)
            .await?
            .ok_or_else(|| SettlementError::PolicyNotFound(request.policy_id.to_string()))?;
        if record.phone() != &request.phone {
            return Err(SettlementError::Precondition(
                "policy is not owned by this subscriber".to_string(),
            ));
        }
        if !record.status().can_claim() {
            return Err(SettlementError::Precondition(format!(
                "policy is {} and cannot be claimed",
                record.status()
            )));
        }

        let record = self
            .store
            .update_status(record.order_id(), PolicyTransition::ClaimStarted)
            .await?;

        match self.settle_claim(&record).await {
            Ok(receipt) => {
                self.store
                    .update_status(record.order_id(), PolicyTransition::ClaimSettled)
                    .await?;

                metrics::counter!("claims_settled_total").increment(1);
                tracing::info!(tx_hash = %receipt.tx_hash, "claim settled");
                Ok(receipt)
            }
            Err(err) => {
                let reason = err.to_string();
                if let Err(store_err) = self
                    .store
                    .update_status(record.order_id(), PolicyTransition::ClaimFailed { reason })
                    .await
                {
                    tracing::error!(error = %store_err, "failed to record claim failure");
                }
                self.file_offramp_ticket(&record, &err).await;

                metrics::counter!("claims_failed_total").increment(1);
                tracing::warn!(error = %err, "claim failed");
                Err(err)
            }
        }
    }

    /// Escrow withdrawal and off-ramp payout for a Claiming record.
    async fn settle_claim(&self, record: &PolicyRecord) -> Result<ClaimReceipt> {
        let signer = self
            .call("signer_for", self.custody.signer_for(record.wallet_address()))
            .await?;
        let gas = self
            .call("gas_balance", self.escrow.gas_balance(&signer))
            .await?;
        if gas == 0 {
            return Err(SettlementError::InsufficientGas(format!(
                "signer {} cannot fund the escrow withdrawal",
                signer.address
            )));
        }

        let withdrawal = self
            .call(
                "escrow_withdraw",
                self.escrow.withdraw(
                    &signer,
                    &self.config.chain.token_address,
                    record.crypto_amount(),
                    record.wallet_address(),
                ),
            )
            .await?;

        // The off-ramp quote only signals rate availability; the payout is
        // keyed by the withdrawal itself.
        self.call(
            "quote",
            self.quote.quote(
                QuoteDirection::OffRamp,
                QuoteAmount::Crypto(record.crypto_amount()),
            ),
        )
        .await?;

        let payout = self
            .call(
                "submit_payout",
                self.offramp.submit_payout(
                    &self.config.chain.network,
                    &withdrawal.tx_hash,
                    record.phone(),
                    &self.config.chain.token_address,
                ),
            )
            .await?;

        Ok(ClaimReceipt {
            explorer_link: self.config.chain.explorer_link(&withdrawal.tx_hash),
            tx_hash: withdrawal.tx_hash,
            payout_order_id: payout.order_id,
        })
    }

    /// Current settlement progress for an order.
    pub async fn status(&self, order_id: &OrderId) -> Result<PolicyStatusView> {
        let record = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| SettlementError::PolicyNotFound(order_id.to_string()))?;

        Ok(PolicyStatusView {
            status: record.status(),
            explorer_link: record
                .chain_tx_hash()
                .map(|hash| self.config.chain.explorer_link(hash)),
            transaction_hash: record.chain_tx_hash().cloned(),
        })
    }

    /// All policies owned by a subscriber.
    pub async fn policies_for(&self, phone: &Msisdn) -> Result<Vec<PolicyRecord>> {
        Ok(self.store.find_by_owner(phone).await?)
    }

    /// Wraps a provider call in the request-level timeout.
    async fn call<V>(
        &self,
        step: &'static str,
        fut: impl Future<Output = Result<V>>,
    ) -> Result<V> {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SettlementError::ProviderTimeout(step.to_string())),
        }
    }

    /// Files a manual-intervention ticket for fiat taken without cover
    /// delivered. Best effort.
    async fn file_onramp_ticket(&self, record: &PolicyRecord, err: &SettlementError) {
        let ticket = Ticket {
            phone: record.phone().clone(),
            amount: record.fiat_amount().to_string(),
            description: format!("Policy purchase settlement failed: {}", err),
            side: TicketSide::OnRamp,
            wallet_address: record.wallet_address().clone(),
            token_symbol: self.config.chain.token_symbol.clone(),
            token_address: self.config.chain.token_address.clone(),
            chain: self.config.chain.network.clone(),
        };
        if let Err(ticket_err) = self.ticketing.file(ticket).await {
            tracing::warn!(error = %ticket_err, "failed to file on-ramp ticket");
        }
    }

    /// Files a manual-intervention ticket for a claim that could not pay
    /// out. Best effort.
    async fn file_offramp_ticket(&self, record: &PolicyRecord, err: &SettlementError) {
        let ticket = Ticket {
            phone: record.phone().clone(),
            amount: record
                .crypto_amount()
                .format_units(self.config.chain.token_decimals),
            description: format!("Claim payout failed: {}", err),
            side: TicketSide::OffRamp,
            wallet_address: record.wallet_address().clone(),
            token_symbol: self.config.chain.token_symbol.clone(),
            token_address: self.config.chain.token_address.clone(),
            chain: self.config.chain.network.clone(),
        };
        if let Err(ticket_err) = self.ticketing.file(ticket).await {
            tracing::warn!(error = %ticket_err, "failed to file off-ramp ticket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{
        InMemoryEscrowLedger, InMemoryFiatRailClient, InMemoryKeyCustody, InMemoryOffRampClient,
        InMemoryOnRampClient, InMemoryQuoteClient, InMemoryTicketingClient, StatusReport,
    };
    use domain::InMemoryPolicyStore;

    type TestSaga = SettlementSaga<
        InMemoryPolicyStore,
        InMemoryQuoteClient,
        InMemoryFiatRailClient,
        InMemoryOnRampClient,
        InMemoryEscrowLedger,
        InMemoryOffRampClient,
        InMemoryTicketingClient,
        InMemoryKeyCustody,
    >;

    struct Harness {
        saga: Arc<TestSaga>,
        store: InMemoryPolicyStore,
        rail: InMemoryFiatRailClient,
        onramp: InMemoryOnRampClient,
        escrow: InMemoryEscrowLedger,
        offramp: InMemoryOffRampClient,
        ticketing: InMemoryTicketingClient,
    }

    fn setup() -> Harness {
        let store = InMemoryPolicyStore::new();
        let quote = InMemoryQuoteClient::new();
        let rail = InMemoryFiatRailClient::new();
        let onramp = InMemoryOnRampClient::new();
        let escrow = InMemoryEscrowLedger::new();
        let offramp = InMemoryOffRampClient::new();
        let ticketing = InMemoryTicketingClient::new();
        let custody = InMemoryKeyCustody::new();

        let saga = Arc::new(SettlementSaga::new(
            store.clone(),
            PremiumCatalog::builtin(),
            quote.clone(),
            rail.clone(),
            onramp.clone(),
            escrow.clone(),
            offramp.clone(),
            ticketing.clone(),
            custody,
            SettlementConfig::fast(),
        ));

        Harness {
            saga,
            store,
            rail,
            onramp,
            escrow,
            offramp,
            ticketing,
        }
    }

    fn request() -> PurchaseRequest {
        PurchaseRequest {
            phone: Msisdn::new("254712345678"),
            wallet_address: Some(WalletAddress::new("0xabc")),
            fiat_amount: FiatAmount::from_whole(200),
            premium_id: "basic-accident".to_string(),
            duration: "monthly".to_string(),
        }
    }

    #[tokio::test]
    async fn purchase_persists_pending_record() {
        let h = setup();
        h.rail.set_next_order_id("abc123");

        let accepted = h.saga.purchase(request()).await.unwrap();
        assert_eq!(accepted.order_id.as_str(), "abc123");
        assert_eq!(accepted.crypto_amount, TokenAmount::from_units(1_520_000));

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), PolicyStatus::Pending);
        assert_eq!(record.premium_name(), "Basic Accident");
    }

    #[tokio::test]
    async fn purchase_rejects_bad_input() {
        let h = setup();

        let bad_duration = PurchaseRequest {
            duration: "fortnightly".to_string(),
            ..request()
        };
        assert!(matches!(
            h.saga.purchase(bad_duration).await,
            Err(SettlementError::Validation(_))
        ));

        let bad_premium = PurchaseRequest {
            premium_id: "platinum".to_string(),
            ..request()
        };
        assert!(matches!(
            h.saga.purchase(bad_premium).await,
            Err(SettlementError::UnknownPremium(_))
        ));

        let no_wallet = PurchaseRequest {
            wallet_address: None,
            ..request()
        };
        assert!(matches!(
            h.saga.purchase(no_wallet).await,
            Err(SettlementError::Precondition(_))
        ));

        let zero_amount = PurchaseRequest {
            fiat_amount: FiatAmount::zero(),
            ..request()
        };
        assert!(matches!(
            h.saga.purchase(zero_amount).await,
            Err(SettlementError::Validation(_))
        ));

        assert_eq!(h.store.record_count().await, 0);
    }

    #[tokio::test]
    async fn rail_initiation_is_retried_within_budget() {
        let h = setup();
        h.rail.fail_next_initiations(2);

        let accepted = h.saga.purchase(request()).await.unwrap();
        assert_eq!(h.rail.initiation_count(), 3);
        assert!(h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn rail_initiation_gives_up_after_budget() {
        let h = setup();
        h.rail.fail_next_initiations(3);

        let result = h.saga.purchase(request()).await;
        assert!(matches!(result, Err(SettlementError::RailRejected(_))));
        assert_eq!(h.rail.initiation_count(), 3);
        assert_eq!(h.store.record_count().await, 0);
    }

    #[tokio::test]
    async fn settlement_activates_after_pending_polls() {
        let h = setup();
        h.onramp
            .script_statuses([StatusReport::pending(), StatusReport::pending()]);

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Active);
        assert_eq!(h.onramp.status_count(), 3);

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status(), PolicyStatus::Active);
        assert!(record.chain_tx_hash().is_some());
        assert_eq!(
            h.escrow.escrowed_balance(record.wallet_address()),
            1_520_000
        );
        assert_eq!(h.ticketing.ticket_count(), 0);
    }

    #[tokio::test]
    async fn confirmation_timeout_fails_the_policy() {
        let h = setup();
        h.onramp
            .script_statuses((0..12).map(|_| StatusReport::pending()));

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Failed);
        assert_eq!(h.onramp.status_count(), 12);

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.rail_detail().unwrap().contains("not confirmed"));
        assert_eq!(h.ticketing.ticket_count(), 1);
    }

    #[tokio::test]
    async fn definitive_rail_failure_stops_polling() {
        let h = setup();
        h.onramp.script_statuses([
            StatusReport::pending(),
            StatusReport::failed("Request cancelled by user"),
        ]);

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Failed);
        assert_eq!(h.onramp.status_count(), 2);
        assert_eq!(h.onramp.settle_count(), 0);

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.rail_detail().unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn exchange_rate_failures_retry_then_succeed() {
        let h = setup();
        h.onramp.script_settle_failures([
            "Exchange rate moved".to_string(),
            "Exchange rate moved".to_string(),
        ]);

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Active);
        assert_eq!(h.onramp.settle_count(), 3);
    }

    #[tokio::test]
    async fn exchange_rate_failures_exhaust_budget() {
        let h = setup();
        h.onramp.script_settle_failures([
            "Exchange rate moved".to_string(),
            "Exchange rate moved".to_string(),
            "Exchange rate moved".to_string(),
        ]);

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Failed);
        assert_eq!(h.onramp.settle_count(), 3);
        assert_eq!(h.ticketing.ticket_count(), 1);

        let ticket = h.ticketing.last_ticket().unwrap();
        assert_eq!(ticket.side, TicketSide::OnRamp);
        assert_eq!(ticket.amount, "200.00");
    }

    #[tokio::test]
    async fn terminal_settle_failure_is_not_retried() {
        let h = setup();
        h.onramp
            .script_settle_failures(["order already consumed".to_string()]);

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Failed);
        assert_eq!(h.onramp.settle_count(), 1);
    }

    #[tokio::test]
    async fn zero_gas_fails_before_deposit() {
        let h = setup();
        h.escrow.set_gas_balance(0);

        let accepted = h.saga.purchase(request()).await.unwrap();
        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Failed);
        assert_eq!(h.escrow.deposit_count(), 0);

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.rail_detail().unwrap().contains("Insufficient gas"));
    }

    #[tokio::test]
    async fn lease_holder_excludes_concurrent_settlement() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();

        let _lease = h.saga.leases.acquire(&accepted.order_id).unwrap();
        let result = h.saga.run_purchase(&accepted.order_id).await;
        assert!(matches!(result, Err(SettlementError::SagaInFlight(_))));
    }

    #[tokio::test]
    async fn settled_order_is_not_resettled() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();
        h.saga.run_purchase(&accepted.order_id).await.unwrap();

        let status = h.saga.run_purchase(&accepted.order_id).await.unwrap();
        assert_eq!(status, PolicyStatus::Active);
        // One settle from the first run only.
        assert_eq!(h.onramp.settle_count(), 1);
        assert_eq!(h.escrow.deposit_count(), 1);
    }

    #[tokio::test]
    async fn status_view_carries_explorer_link_once_active() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();

        let view = h.saga.status(&accepted.order_id).await.unwrap();
        assert_eq!(view.status, PolicyStatus::Pending);
        assert!(view.transaction_hash.is_none());
        assert!(view.explorer_link.is_none());

        h.saga.run_purchase(&accepted.order_id).await.unwrap();
        let view = h.saga.status(&accepted.order_id).await.unwrap();
        assert_eq!(view.status, PolicyStatus::Active);
        let link = view.explorer_link.unwrap();
        assert!(link.contains("/tx/"));
        assert!(link.ends_with(view.transaction_hash.unwrap().as_str()));
    }

    #[tokio::test]
    async fn claim_pays_out_and_terminates() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();
        h.saga.run_purchase(&accepted.order_id).await.unwrap();

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        let receipt = h
            .saga
            .claim(ClaimRequest {
                policy_id: record.id(),
                phone: record.phone().clone(),
            })
            .await
            .unwrap();

        assert!(receipt.tx_hash.as_str().starts_with("0xwithdraw"));
        assert!(receipt.explorer_link.ends_with(receipt.tx_hash.as_str()));
        assert_eq!(h.offramp.last_tx_hash(), Some(receipt.tx_hash));
        assert_eq!(h.escrow.escrowed_balance(record.wallet_address()), 0);

        let record = h.store.find_by_id(&record.id()).await.unwrap().unwrap();
        assert_eq!(record.status(), PolicyStatus::Claimed);
    }

    #[tokio::test]
    async fn claim_preconditions_reject_without_side_effects() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();
        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();

        // Still Pending.
        let early = h
            .saga
            .claim(ClaimRequest {
                policy_id: record.id(),
                phone: record.phone().clone(),
            })
            .await;
        assert!(matches!(early, Err(SettlementError::Precondition(_))));

        h.saga.run_purchase(&accepted.order_id).await.unwrap();

        // Wrong owner.
        let stranger = h
            .saga
            .claim(ClaimRequest {
                policy_id: record.id(),
                phone: Msisdn::new("254700000000"),
            })
            .await;
        assert!(matches!(stranger, Err(SettlementError::Precondition(_))));

        // Unknown policy.
        let missing = h
            .saga
            .claim(ClaimRequest {
                policy_id: PolicyId::new(),
                phone: record.phone().clone(),
            })
            .await;
        assert!(matches!(missing, Err(SettlementError::PolicyNotFound(_))));

        assert_eq!(h.escrow.withdraw_count(), 0);
        assert_eq!(h.offramp.payout_count(), 0);
    }

    #[tokio::test]
    async fn failed_payout_fails_the_claim_and_files_ticket() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();
        h.saga.run_purchase(&accepted.order_id).await.unwrap();
        h.offramp.set_fail_on_payout(true);

        let record = h
            .store
            .find_by_order_id(&accepted.order_id)
            .await
            .unwrap()
            .unwrap();
        let result = h
            .saga
            .claim(ClaimRequest {
                policy_id: record.id(),
                phone: record.phone().clone(),
            })
            .await;
        assert!(matches!(result, Err(SettlementError::OffRampRejected(_))));

        let record = h.store.find_by_id(&record.id()).await.unwrap().unwrap();
        assert_eq!(record.status(), PolicyStatus::Failed);

        let ticket = h.ticketing.last_ticket().unwrap();
        assert_eq!(ticket.side, TicketSide::OffRamp);
        assert_eq!(ticket.amount, "1.52");
    }

    #[tokio::test]
    async fn dispatched_purchase_settles_in_background() {
        let h = setup();
        let accepted = h.saga.purchase(request()).await.unwrap();

        h.saga.dispatch_purchase(accepted.order_id.clone());

        let mut status = PolicyStatus::Pending;
        for _ in 0..100 {
            status = h
                .store
                .find_by_order_id(&accepted.order_id)
                .await
                .unwrap()
                .unwrap()
                .status();
            if status.is_terminal() || status == PolicyStatus::Active {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(status, PolicyStatus::Active);
    }
}
