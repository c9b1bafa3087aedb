//! HTTP API server with observability for the policy settlement system.
//!
//! Provides REST endpoints for policy purchase, status, and claims, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{PolicyStore, PremiumCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use settlement::clients::{
    InMemoryEscrowLedger, InMemoryFiatRailClient, InMemoryKeyCustody, InMemoryOffRampClient,
    InMemoryOnRampClient, InMemoryQuoteClient, InMemoryTicketingClient,
};
use settlement::{SettlementConfig, SettlementSaga};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::policies::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<St: PolicyStore + 'static>(
    state: Arc<AppState<St>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/premiums", get(routes::policies::premiums::<St>))
        .route("/policies", post(routes::policies::buy::<St>))
        .route("/policies", get(routes::policies::list::<St>))
        .route(
            "/policies/{order_id}/status",
            get(routes::policies::status::<St>),
        )
        .route(
            "/policies/{policy_id}/claim",
            post(routes::policies::claim::<St>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles onto the in-process provider clients wired into the saga, kept
/// for scripting behavior in tests and local runs.
pub struct ProviderHandles {
    pub quote: InMemoryQuoteClient,
    pub rail: InMemoryFiatRailClient,
    pub onramp: InMemoryOnRampClient,
    pub escrow: InMemoryEscrowLedger,
    pub offramp: InMemoryOffRampClient,
    pub ticketing: InMemoryTicketingClient,
    pub custody: InMemoryKeyCustody,
}

/// Creates the default application state over the given policy store, with
/// in-process provider clients.
pub fn create_default_state<St: PolicyStore>(
    store: St,
    config: SettlementConfig,
) -> (Arc<AppState<St>>, ProviderHandles) {
    let quote = InMemoryQuoteClient::new();
    let rail = InMemoryFiatRailClient::new();
    let onramp = InMemoryOnRampClient::new();
    let escrow = InMemoryEscrowLedger::new();
    let offramp = InMemoryOffRampClient::new();
    let ticketing = InMemoryTicketingClient::new();
    let custody = InMemoryKeyCustody::new();

    let saga = Arc::new(SettlementSaga::new(
        store,
        PremiumCatalog::builtin(),
        quote.clone(),
        rail.clone(),
        onramp.clone(),
        escrow.clone(),
        offramp.clone(),
        ticketing.clone(),
        custody.clone(),
        config,
    ));

    let state = Arc::new(AppState { saga });
    let providers = ProviderHandles {
        quote,
        rail,
        onramp,
        escrow,
        offramp,
        ticketing,
        custody,
    };

    (state, providers)
}
