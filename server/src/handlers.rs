//! Entry handlers.
//!
//! Every handler runs behind [`auth_middleware`](crate::auth::auth_middleware)
//! and is scoped to the authenticated account.

use crate::AppState;
use crate::error::ServerError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use lockbox_storage::AccountId;
use lockbox_sync::protocol::{
    FetchRequest, HealthResponse, InsertRequest, InsertResponse, MAX_BATCH_SIZE, UpdateRequest,
};
use lockbox_types::{EntityClass, ServerEntry, ServerSummary};
use tracing::{debug, info};

fn parse_class(raw: &str) -> Result<EntityClass, ServerError> {
    raw.parse()
        .map_err(|_| ServerError::InvalidEntityClass(raw.to_string()))
}

fn check_batch(len: usize) -> Result<(), ServerError> {
    if len > MAX_BATCH_SIZE {
        return Err(ServerError::BadRequest(format!(
            "batch of {len} exceeds the limit of {MAX_BATCH_SIZE}"
        )));
    }
    Ok(())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

pub async fn summaries(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Path(class): Path<String>,
) -> Result<Json<Vec<ServerSummary>>, ServerError> {
    let class = parse_class(&class)?;
    Ok(Json(state.store.summaries(account, class)?))
}

pub async fn all_entries(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Path(class): Path<String>,
) -> Result<Json<Vec<ServerEntry>>, ServerError> {
    let class = parse_class(&class)?;
    let entries = state.store.all_entries(account, class)?;
    debug!("Serving all {} {} entries to account {}", entries.len(), class, account);
    Ok(Json(entries))
}

pub async fn fetch_entries(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Path(class): Path<String>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<Vec<ServerEntry>>, ServerError> {
    let class = parse_class(&class)?;
    check_batch(req.ids.len())?;
    Ok(Json(state.store.entries_by_ids(account, class, &req.ids)?))
}

pub async fn insert_entries(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Path(class): Path<String>,
    Json(req): Json<InsertRequest>,
) -> Result<Json<InsertResponse>, ServerError> {
    let class = parse_class(&class)?;
    check_batch(req.entries.len())?;
    let ids = state.store.insert_entries(account, class, &req.entries)?;
    info!("Account {} pushed {} {} entries", account, ids.len(), class);
    Ok(Json(InsertResponse { ids }))
}

pub async fn update_entries(
    State(state): State<AppState>,
    Extension(account): Extension<AccountId>,
    Path(class): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> Result<StatusCode, ServerError> {
    let class = parse_class(&class)?;
    check_batch(req.entries.len())?;
    state.store.update_entries(account, class, &req.entries)?;
    info!("Account {} overwrote {} {} entries", account, req.entries.len(), class);
    Ok(StatusCode::NO_CONTENT)
}
