//! Lock inventory and removal handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rbd_common::Lock;

use super::{AppState, error::ApiError};

/// `GET /lock`: every lock on every image.
pub async fn list_locks(State(state): State<AppState>) -> Result<Json<Vec<Lock>>, ApiError> {
    let locks = state.broker.inventory.list_all().await?;
    Ok(Json(locks))
}

/// `DELETE /lock/{image_name}/{lock_name}/{locker}`: force-release a lock.
///
/// Clients quote lock ids containing spaces; the quotes are not part of the id.
pub async fn delete_lock(
    State(state): State<AppState>,
    Path((image_name, lock_name, locker)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    let lock_name = lock_name.replace('"', "");
    state
        .broker
        .reclaimer
        .release(&image_name, &lock_name, &locker)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
