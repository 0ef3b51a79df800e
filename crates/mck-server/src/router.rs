use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::gateway;
use crate::handler::{self, AppState};

/// Build the axum router with all Mockchain endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::health_handler))
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/broadcast", post(handler::broadcast_handler))
        .route("/tx/:txid", get(handler::transaction_handler))
        .route("/utxos/:address", get(handler::utxos_handler))
        .route("/spent", post(handler::spent_batch_handler))
        .route("/spent/:loc", get(handler::spent_handler))
        .route("/fund/:address", get(handler::fund_handler))
        .route("/jig/:loc", get(handler::jig_handler))
        .route("/jigs/:address", get(handler::jigs_for_address_handler))
        .route("/jigs/kind/:kind", post(handler::jigs_by_kind_handler))
        .route("/jigs/origin/:origin", post(handler::jigs_by_origin_handler))
        .route("/message", post(handler::post_message_handler))
        .route("/message/:id", get(handler::message_handler))
        .route("/sse/:channel", get(gateway::sse_handler))
        .route("/events/:channel", get(gateway::poll_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
