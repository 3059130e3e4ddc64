//! HTTP routes under `/api`.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use gramseva_types::api::{
    HealthResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SettleBillRequest,
    SettleBillResponse, SuccessResponse,
};
use gramseva_types::{
    Account, AppNotification, Bill, Collection, LocalBusiness, Record, ServiceRequest, Transaction,
    VillageNotice,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::{AppState, auth, officer_keys, websocket};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/officer-keys", get(list_officer_keys))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/admin/clear-data", post(clear_data))
        .route("/api/bills/{id}/settle", post(settle_bill))
        .route("/api/ws", get(websocket::handle_websocket))
        .route("/api/{collection}", get(read_collection).post(replace_collection))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_collection(name: &str) -> Result<Collection, ApiError> {
    name.parse()
        .map_err(|_| ApiError::UnknownCollection(name.to_string()))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Malformed request body: {e}")))
}

/// Reject arrays that do not deserialize as the collection's record type.
/// The value itself is still persisted verbatim.
fn validate_records(collection: Collection, value: &Value) -> Result<(), ApiError> {
    fn check<T: Record>(value: &Value) -> Result<(), serde_json::Error> {
        Vec::<T>::deserialize(value).map(drop)
    }

    let result = match collection {
        Collection::Accounts => check::<Account>(value),
        Collection::Requests => check::<ServiceRequest>(value),
        Collection::Bills => check::<Bill>(value),
        Collection::Transactions => check::<Transaction>(value),
        Collection::Notices => check::<VillageNotice>(value),
        Collection::Notifications => check::<AppNotification>(value),
        Collection::Businesses => check::<LocalBusiness>(value),
    };
    result.map_err(|e| ApiError::BadRequest(format!("Invalid {collection} array: {e}")))
}

// ============================================================================
// Collections
// ============================================================================

async fn read_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let collection = parse_collection(&name)?;
    Ok(Json(state.store.read_raw(collection).await))
}

async fn replace_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ApiError> {
    let collection = parse_collection(&name)?;
    let mut value: Value = parse_body(&body)?;
    validate_records(collection, &value)?;

    let _guard = state.store.lock(collection).await;
    if collection == Collection::Accounts {
        let existing = state.store.read_raw(collection).await;
        auth::guard_account_writes(&existing, &mut value);
    }
    state.store.persist(collection, &value).await?;
    state.bus.publish(collection, value);

    Ok(Json(SuccessResponse::OK))
}

// ============================================================================
// Auth
// ============================================================================

async fn list_officer_keys(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(officer_keys::load(&state.store).await)
}

async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<LoginResponse>, ApiError> {
    let req: LoginRequest = parse_body(&body)?;
    let account = auth::login(&state.store, &req).await?;
    Ok(Json(LoginResponse {
        success: true,
        account,
    }))
}

async fn register(State(state): State<AppState>, body: Bytes) -> Result<Json<RegisterResponse>, ApiError> {
    let req: RegisterRequest = parse_body(&body)?;
    let (response, payload) = auth::register(&state.store, req).await?;
    state.bus.publish(Collection::Accounts, payload);
    Ok(Json(response))
}

// ============================================================================
// Settlement
// ============================================================================

/// Mark a bill paid and append its transaction under both collection locks.
async fn settle_bill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SettleBillResponse>, ApiError> {
    let payment: SettleBillRequest = parse_body(&body)?;
    let store = &state.store;

    let _bills_guard = store.lock(Collection::Bills).await;
    let _transactions_guard = store.lock(Collection::Transactions).await;

    let previous_bills = store.read_raw(Collection::Bills).await;
    let mut bills: Vec<Bill> = store.read_for_update().await?;
    let bill = bills
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("Bill {id} not found")))?;
    let transaction = bill.settle(&payment)?;
    let bill = bill.clone();

    let mut transactions: Vec<Transaction> = store.read_for_update().await?;
    transactions.push(transaction.clone());

    let bills_payload = store.persist_records(&bills).await?;
    let transactions_payload = match store.persist_records(&transactions).await {
        Ok(payload) => payload,
        Err(e) => {
            if let Err(rollback) = store.persist(Collection::Bills, &previous_bills).await {
                error!(bill = %id, error = %rollback, "settle rollback failed");
            }
            return Err(e.into());
        }
    };

    state.bus.publish(Collection::Bills, bills_payload);
    state.bus.publish(Collection::Transactions, transactions_payload);
    info!(bill = %id, method = %payment.method, amount = bill.amount, "bill settled");

    Ok(Json(SettleBillResponse {
        success: true,
        bill,
        transaction,
    }))
}

// ============================================================================
// Admin
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn clear_data(State(state): State<AppState>) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.clear_all().await?;
    for collection in Collection::all() {
        state.bus.publish(collection, Value::Array(Vec::new()));
    }
    warn!("all collections cleared");
    Ok(Json(SuccessResponse::OK))
}
