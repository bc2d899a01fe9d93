//! Whitelist Routes
//!
//! Handlers for the dashboard's whitelist table. Every handler provisions
//! the table first, then runs its store operation; a store failure goes
//! through `AppState::degrade` and, under the fallback policy, the request is
//! answered from a private copy of the fallback list.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use std::future::Future;
use tracing::info;

use crate::api::middleware::{
    parse_body, validate_allocation, validate_email, validate_wallet_address, ApiError,
};
use crate::api::server::{AppState, SharedAppState};
use crate::types::whitelist::{
    AddRequest, BulkAddRequest, BulkAddResponse, EntryResponse, NewWhitelistEntry, RemoveRequest,
    UpdateRequest, WhitelistEntry, WhitelistPatch, WhitelistRow,
};
use crate::whitelist::{OnStoreError, WhitelistError};

/// Provision the table, then run `op`
async fn with_table<T, F, Fut>(state: &AppState, op: F) -> Result<T, WhitelistError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, WhitelistError>>,
{
    state.whitelist.ensure_table().await?;
    op().await
}

/// Validated address field of a request body
fn required_address(address: Option<String>) -> Result<String, ApiError> {
    let address = address.unwrap_or_default();
    validate_wallet_address(&address).into_result()?;
    Ok(address)
}

fn optional_email(email: Option<String>) -> Result<Option<String>, ApiError> {
    if let Some(email) = &email {
        validate_email(email).into_result()?;
    }
    Ok(email)
}

/// GET /whitelist
///
/// An empty table is answered with the fallback list so the dashboard always
/// has rows to render, unless the policy is to propagate.
pub async fn handle_list(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<WhitelistRow>>, ApiError> {
    let result = with_table(&state, || state.whitelist.list()).await;

    let entries = match result {
        Ok(entries) if !entries.is_empty() => entries,
        Ok(entries) => match state.on_store_error {
            OnStoreError::ReturnFallback => {
                info!(table = %state.whitelist.table(), "whitelist empty, serving fallback list");
                state.fallback.entries()
            }
            OnStoreError::Propagate => entries,
        },
        Err(WhitelistError::Storage(e)) => state.degrade("list", &e)?.into_entries(),
        Err(e) => return Err(e.into()),
    };

    Ok(Json(entries.iter().map(WhitelistRow::from).collect()))
}

/// GET /whitelist/:address
pub async fn handle_get(
    State(state): State<SharedAppState>,
    Path(address): Path<String>,
) -> Result<Json<WhitelistEntry>, ApiError> {
    let result = with_table(&state, || state.whitelist.get(&address)).await;

    let entry = match result {
        Ok(entry) => entry,
        Err(WhitelistError::Storage(e)) => state.degrade("get", &e)?.get(&address).cloned(),
        Err(e) => return Err(e.into()),
    };

    entry
        .map(Json)
        .ok_or_else(|| WhitelistError::NotWhitelisted(address).into())
}

/// POST /whitelist/add
pub async fn handle_add(
    State(state): State<SharedAppState>,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let request = parse_body(payload)?;
    let address = required_address(request.address)?;
    let data = NewWhitelistEntry {
        email: optional_email(request.email)?,
        allocation: validate_allocation(request.allocation)?,
    };

    let result = with_table(&state, || state.whitelist.add(&address, data.clone())).await;

    let user = match result {
        Ok(user) => user,
        Err(WhitelistError::Storage(e)) => state.degrade("add", &e)?.add(&address, data)?,
        Err(e) => return Err(e.into()),
    };

    Ok((
        StatusCode::CREATED,
        Json(EntryResponse {
            success: true,
            user,
        }),
    ))
}

/// POST /whitelist/bulk-add
pub async fn handle_bulk_add(
    State(state): State<SharedAppState>,
    payload: Result<Json<BulkAddRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkAddResponse>), ApiError> {
    let request = parse_body(payload)?;
    let addresses = bulk_addresses(request.addresses)?;
    let allocation = validate_allocation(request.allocation)?.unwrap_or(0);

    let outcome = match state.whitelist.ensure_table().await {
        Ok(()) => state.whitelist.bulk_add(&addresses, allocation).await,
        Err(WhitelistError::Storage(e)) => state
            .degrade("bulk_add", &e)?
            .bulk_add(&addresses, allocation),
        Err(e) => return Err(e.into()),
    };

    info!(
        added = outcome.added_count,
        skipped = outcome.skipped_count,
        "bulk add complete"
    );

    Ok((
        StatusCode::CREATED,
        Json(BulkAddResponse {
            success: true,
            outcome,
        }),
    ))
}

/// `addresses` must be a non-empty array of strings
///
/// Strings that are not valid addresses are not rejected here; the bulk add
/// reports them in `skippedAddresses`.
fn bulk_addresses(value: Option<serde_json::Value>) -> Result<Vec<String>, ApiError> {
    let items = match value {
        Some(serde_json::Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(ApiError::validation(
                "Addresses must be a non-empty array of strings",
            ))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(address) => Ok(address),
            other => Err(ApiError::Validation(format!(
                "Address must be a string, got {}",
                other
            ))),
        })
        .collect()
}

/// DELETE /whitelist/remove
pub async fn handle_remove(
    State(state): State<SharedAppState>,
    payload: Result<Json<RemoveRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    let request = parse_body(payload)?;
    let address = required_address(request.address)?;

    let result = with_table(&state, || state.whitelist.remove(&address)).await;

    let user = match result {
        Ok(user) => user.into_removed(),
        Err(WhitelistError::Storage(e)) => state.degrade("remove", &e)?.remove(&address)?,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(EntryResponse {
        success: true,
        user,
    }))
}

/// PUT /whitelist/update
pub async fn handle_update(
    State(state): State<SharedAppState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<EntryResponse>, ApiError> {
    let request = parse_body(payload)?;
    let address = required_address(request.address)?;
    let patch = WhitelistPatch {
        email: optional_email(request.email)?,
        allocation: validate_allocation(request.allocation)?,
        status: request.status,
    };

    if patch.is_empty() {
        return Err(ApiError::validation(
            "Nothing to update: provide email, allocation or status",
        ));
    }

    let result = with_table(&state, || state.whitelist.update(&address, &patch)).await;

    let user = match result {
        Ok(user) => user,
        Err(WhitelistError::Storage(e)) => state.degrade("update", &e)?.update(&address, &patch)?,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(EntryResponse {
        success: true,
        user,
    }))
}

// =============================================================================
// Tests
// =============================================================================
