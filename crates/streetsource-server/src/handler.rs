use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use streetsource_ledger::{
    LedgerCommands, LedgerError, LedgerEvent, LedgerQueries, PlatformStats, Review, Supplier,
    SupplierRating, SupplierSummary, TrustLedger,
};
use streetsource_types::CallerId;

use crate::auth::{parse_caller, Caller};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_info: String,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    /// Wider than a score so out-of-range values reach ledger validation.
    pub score: i64,
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub supplier: String,
    pub is_verified: bool,
    pub changed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

/// Run a journaling command off the async workers; appends may fsync.
async fn blocking<T, F>(ledger: &Arc<TrustLedger>, f: F) -> ServerResult<T>
where
    F: FnOnce(&TrustLedger) -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    let ledger = Arc::clone(ledger);
    tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler(State(state): State<AppState>) -> ServerResult<Json<serde_json::Value>> {
    let ledger = state.ledger();
    Ok(Json(json!({
        "name": "streetsource-server",
        "version": env!("CARGO_PKG_VERSION"),
        "owner": ledger.owner(),
        "last_seq": ledger.last_seq()?,
    })))
}

pub async fn list_suppliers(State(state): State<AppState>) -> ServerResult<Json<Vec<String>>> {
    Ok(Json(state.ledger().all_suppliers()?))
}

pub async fn list_summaries(
    State(state): State<AppState>,
) -> ServerResult<Json<Vec<SupplierSummary>>> {
    Ok(Json(state.ledger().supplier_summaries()?))
}

pub async fn register_supplier(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<RegisterRequest>,
) -> ServerResult<(StatusCode, Json<Supplier>)> {
    let supplier = blocking(state.ledger(), move |ledger| {
        ledger.register_supplier(&req.name, &req.description, &req.contact_info, &caller)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn supplier_details(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Json<Supplier>> {
    Ok(Json(state.ledger().supplier_details(&name)?))
}

pub async fn supplier_rating(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Json<SupplierRating>> {
    Ok(Json(state.ledger().supplier_rating(&name)?))
}

pub async fn supplier_reviews(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ServerResult<Json<Vec<Review>>> {
    Ok(Json(state.ledger().supplier_reviews(&name)?))
}

pub async fn add_rating(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(name): Path<String>,
    Json(req): Json<RateRequest>,
) -> ServerResult<(StatusCode, Json<Review>)> {
    let review = blocking(state.ledger(), move |ledger| {
        // Unknown supplier is reported before a malformed score.
        ledger.supplier_details(&name)?;
        let score = u8::try_from(req.score).map_err(|_| {
            LedgerError::Validation(format!("score must be between 1 and 5, got {}", req.score))
        })?;
        ledger.add_rating(&name, score, &req.comment, &caller)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn verify_supplier(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(name): Path<String>,
) -> ServerResult<Json<VerificationResponse>> {
    set_verified(state, caller, name, true).await
}

pub async fn unverify_supplier(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(name): Path<String>,
) -> ServerResult<Json<VerificationResponse>> {
    set_verified(state, caller, name, false).await
}

async fn set_verified(
    state: AppState,
    caller: CallerId,
    name: String,
    verified: bool,
) -> ServerResult<Json<VerificationResponse>> {
    let supplier = name.clone();
    let changed = blocking(state.ledger(), move |ledger| {
        if verified {
            ledger.verify_supplier(&name, &caller)
        } else {
            ledger.unverify_supplier(&name, &caller)
        }
    })
    .await?;
    Ok(Json(VerificationResponse {
        supplier,
        is_verified: verified,
        changed,
    }))
}

pub async fn platform_stats(State(state): State<AppState>) -> ServerResult<Json<PlatformStats>> {
    Ok(Json(state.ledger().platform_stats()?))
}

pub async fn caller_ratings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<serde_json::Value>> {
    let caller = parse_caller(&id)?;
    let suppliers = state.ledger().user_ratings(&caller)?;
    Ok(Json(json!({ "caller": caller, "suppliers": suppliers })))
}

pub async fn caller_has_rated(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> ServerResult<Json<serde_json::Value>> {
    let caller = parse_caller(&id)?;
    let has_rated = state.ledger().has_rated(&caller, &name)?;
    Ok(Json(json!({
        "caller": caller,
        "supplier": name,
        "has_rated": has_rated,
    })))
}

pub async fn events_since(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ServerResult<Json<Vec<LedgerEvent>>> {
    let since = query.since;
    let events = blocking(state.ledger(), move |ledger| ledger.events_since(since)).await?;
    Ok(Json(events))
}
