use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use mck_sdk::{
    Address, DerivedObjectFilter, DerivedObjectRecord, MessageBody, MessageId, MessageRecord,
    Mockchain, Outpoint, TransactionId, UtxoRecord,
};

use crate::config::NodeConfig;
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Mockchain>,
    pub config: Arc<NodeConfig>,
}

impl AppState {
    pub fn new(chain: Arc<Mockchain>, config: NodeConfig) -> Self {
        Self {
            chain,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Hex-encoded raw transaction.
    pub rawtx: String,
}

#[derive(Debug, Deserialize)]
pub struct SpentRequest {
    pub locs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FundQuery {
    pub satoshis: Option<u64>,
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    Ok(Json(json!({
        "name": "mockchain",
        "version": env!("CARGO_PKG_VERSION"),
        "last_sequence_id": state.chain.last_sequence()?,
        "channels": state.chain.bus().channel_count().map_err(mck_sdk::SdkError::from)?,
        "derivation_workers": state.config.derivation_workers,
    })))
}

pub async fn broadcast_handler(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> ServerResult<Json<String>> {
    let raw = hex::decode(request.rawtx.trim())
        .map_err(|e| ServerError::BadRequest(format!("rawtx is not hex: {e}")))?;
    let txid = state.chain.apply_transaction(&raw)?;
    Ok(Json(txid.to_hex()))
}

/// Raw transaction as hex.
pub async fn transaction_handler(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> ServerResult<String> {
    let id: TransactionId = txid.parse()?;
    Ok(hex::encode(state.chain.fetch_transaction(&id)?))
}

pub async fn utxos_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ServerResult<Json<Vec<UtxoRecord>>> {
    Ok(Json(state.chain.list_unspent_for_address(&Address::new(address))?))
}

/// Spending transaction id, or an empty body while unspent.
pub async fn spent_handler(
    State(state): State<AppState>,
    Path(loc): Path<String>,
) -> ServerResult<String> {
    let outpoint: Outpoint = loc.parse()?;
    Ok(state
        .chain
        .lookup_spend(&outpoint)?
        .map(|id| id.to_hex())
        .unwrap_or_default())
}

pub async fn spent_batch_handler(
    State(state): State<AppState>,
    Json(request): Json<SpentRequest>,
) -> ServerResult<Json<Vec<String>>> {
    let outpoints = request
        .locs
        .iter()
        .map(|loc| loc.parse::<Outpoint>())
        .collect::<Result<Vec<_>, _>>()?;
    let spends = state.chain.lookup_spends(&outpoints)?;
    Ok(Json(
        spends
            .into_iter()
            .map(|spend| spend.map(|id| id.to_hex()).unwrap_or_default())
            .collect(),
    ))
}

/// Mint a funding output; responds with the funding transaction id.
pub async fn fund_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<FundQuery>,
) -> ServerResult<Json<String>> {
    let applied = state.chain.fund(&Address::new(address), query.satoshis)?;
    Ok(Json(applied.transaction_id.to_hex()))
}

pub async fn jig_handler(
    State(state): State<AppState>,
    Path(loc): Path<String>,
) -> ServerResult<Json<DerivedObjectRecord>> {
    let location: Outpoint = loc.parse()?;
    Ok(Json(state.chain.get_derived_object(&location)?))
}

pub async fn jigs_for_address_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ServerResult<Json<Vec<DerivedObjectRecord>>> {
    Ok(Json(state.chain.derived_objects_for_address(&Address::new(address))?))
}

pub async fn jigs_by_kind_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ServerResult<Json<Vec<String>>> {
    locations(&state, &DerivedObjectFilter::Kind(kind))
}

pub async fn jigs_by_origin_handler(
    State(state): State<AppState>,
    Path(origin): Path<String>,
) -> ServerResult<Json<Vec<String>>> {
    locations(&state, &DerivedObjectFilter::Origin(origin))
}

fn locations(state: &AppState, filter: &DerivedObjectFilter) -> ServerResult<Json<Vec<String>>> {
    let records = state.chain.list_derived_objects(filter)?;
    Ok(Json(records.iter().map(|r| r.location.to_string()).collect()))
}

/// Relay a message to its recipients; responds with the message id.
pub async fn post_message_handler(
    State(state): State<AppState>,
    Json(body): Json<MessageBody>,
) -> ServerResult<Json<String>> {
    let message = state.chain.post_message(body)?;
    Ok(Json(message.id.to_hex()))
}

pub async fn message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<MessageRecord>> {
    let id: MessageId = id.parse()?;
    Ok(Json(state.chain.get_message(&id)?))
}
