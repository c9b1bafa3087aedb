//! Policy purchase, status, claim, and catalog endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{FiatAmount, Msisdn, OrderId, PolicyId, WalletAddress};
use domain::{PolicyRecord, PolicyStore, Premium};
use serde::{Deserialize, Serialize};
use settlement::clients::{
    InMemoryEscrowLedger, InMemoryFiatRailClient, InMemoryKeyCustody, InMemoryOffRampClient,
    InMemoryOnRampClient, InMemoryQuoteClient, InMemoryTicketingClient,
};
use settlement::{ClaimRequest, PurchaseRequest, SettlementSaga};

use crate::error::ApiError;

/// The saga type served by this API: any policy store behind the in-process
/// provider clients.
pub type AppSaga<St> = SettlementSaga<
    St,
    InMemoryQuoteClient,
    InMemoryFiatRailClient,
    InMemoryOnRampClient,
    InMemoryEscrowLedger,
    InMemoryOffRampClient,
    InMemoryTicketingClient,
    InMemoryKeyCustody,
>;

/// Shared application state accessible from all handlers.
pub struct AppState<St: PolicyStore> {
    pub saga: Arc<AppSaga<St>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct BuyPolicyRequest {
    pub phone: String,
    pub wallet_address: Option<String>,
    /// Premium payment in fiat minor units.
    pub amount_cents: i64,
    pub premium_id: String,
    pub duration: String,
}

#[derive(Deserialize)]
pub struct ListPoliciesQuery {
    pub phone: String,
}

#[derive(Deserialize)]
pub struct ClaimBody {
    pub phone: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct PolicyAcceptedResponse {
    pub message: &'static str,
    pub order_id: String,
}

#[derive(Serialize)]
pub struct PolicyResponse {
    pub id: String,
    pub order_id: String,
    pub premium_id: String,
    pub premium_name: String,
    pub status: String,
    pub duration: String,
    pub amount_cents: i64,
    /// Stablecoin cover in base units.
    pub crypto_amount: String,
    pub coverage: BTreeMap<String, bool>,
    pub transaction_hash: Option<String>,
    pub created_at: String,
}

impl PolicyResponse {
    fn from_record(record: &PolicyRecord) -> Self {
        Self {
            id: record.id().to_string(),
            order_id: record.order_id().to_string(),
            premium_id: record.premium_id().to_string(),
            premium_name: record.premium_name().to_string(),
            status: record.status().to_string(),
            duration: record.duration().to_string(),
            amount_cents: record.fiat_amount().cents(),
            crypto_amount: record.crypto_amount().units().to_string(),
            coverage: record.coverage().clone(),
            transaction_hash: record.chain_tx_hash().map(|h| h.to_string()),
            created_at: record.created_at().to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct PolicyStatusResponse {
    pub status: String,
    pub transaction_hash: Option<String>,
    pub explorer_link: Option<String>,
}

#[derive(Serialize)]
pub struct ClaimResponse {
    pub message: &'static str,
    pub transaction_hash: String,
    pub explorer_link: String,
    pub payout_order_id: String,
}

// -- Handlers --

/// POST /policies — validate, initiate payment, and ack with 202.
///
/// Settlement continues in a background task; callers poll the status
/// endpoint with the returned order ID.
#[tracing::instrument(skip(state, req))]
pub async fn buy<St: PolicyStore + 'static>(
    State(state): State<Arc<AppState<St>>>,
    Json(req): Json<BuyPolicyRequest>,
) -> Result<(axum::http::StatusCode, Json<PolicyAcceptedResponse>), ApiError> {
    let accepted = state
        .saga
        .purchase(PurchaseRequest {
            phone: Msisdn::new(req.phone),
            wallet_address: req.wallet_address.map(WalletAddress::new),
            fiat_amount: FiatAmount::from_cents(req.amount_cents),
            premium_id: req.premium_id,
            duration: req.duration,
        })
        .await?;

    state.saga.dispatch_purchase(accepted.order_id.clone());

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(PolicyAcceptedResponse {
            message: "Policy purchase accepted, settlement in progress",
            order_id: accepted.order_id.to_string(),
        }),
    ))
}

/// GET /policies?phone= — list all policies owned by a subscriber.
#[tracing::instrument(skip(state, query))]
pub async fn list<St: PolicyStore + 'static>(
    State(state): State<Arc<AppState<St>>>,
    Query(query): Query<ListPoliciesQuery>,
) -> Result<Json<Vec<PolicyResponse>>, ApiError> {
    let records = state.saga.policies_for(&Msisdn::new(query.phone)).await?;
    Ok(Json(records.iter().map(PolicyResponse::from_record).collect()))
}

/// GET /policies/:order_id/status — settlement progress for one order.
#[tracing::instrument(skip(state))]
pub async fn status<St: PolicyStore + 'static>(
    State(state): State<Arc<AppState<St>>>,
    Path(order_id): Path<String>,
) -> Result<Json<PolicyStatusResponse>, ApiError> {
    let view = state.saga.status(&OrderId::new(order_id)).await?;
    Ok(Json(PolicyStatusResponse {
        status: view.status.to_string(),
        transaction_hash: view.transaction_hash.map(|h| h.to_string()),
        explorer_link: view.explorer_link,
    }))
}

/// POST /policies/:policy_id/claim — settle a claim synchronously.
#[tracing::instrument(skip(state, body))]
pub async fn claim<St: PolicyStore + 'static>(
    State(state): State<Arc<AppState<St>>>,
    Path(policy_id): Path<String>,
    Json(body): Json<ClaimBody>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let policy_id = parse_policy_id(&policy_id)?;
    let receipt = state
        .saga
        .claim(ClaimRequest {
            policy_id,
            phone: Msisdn::new(body.phone),
        })
        .await?;

    Ok(Json(ClaimResponse {
        message: "Claim settled",
        transaction_hash: receipt.tx_hash.to_string(),
        explorer_link: receipt.explorer_link,
        payout_order_id: receipt.payout_order_id.to_string(),
    }))
}

/// GET /premiums — the purchasable product catalog.
#[tracing::instrument(skip(state))]
pub async fn premiums<St: PolicyStore + 'static>(
    State(state): State<Arc<AppState<St>>>,
) -> Json<Vec<Premium>> {
    Json(state.saga.premiums().to_vec())
}

fn parse_policy_id(id: &str) -> Result<PolicyId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid policy ID: {e}")))?;
    Ok(PolicyId::from_uuid(uuid))
}
