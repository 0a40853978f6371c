//! Image provisioning and removal handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use rbd_common::{Volume, VolumeRequest};

use super::{AppState, error::ApiError};

/// `POST /rbd`: create and format an image.
pub async fn create_rbd(
    State(state): State<AppState>,
    body: Result<Json<VolumeRequest>, JsonRejection>,
) -> Result<Json<Volume>, ApiError> {
    let Json(request) = body?;
    let volume = state.broker.provisioner.provision(&request).await?;
    Ok(Json(volume))
}

/// `DELETE /rbd/{image_name}`: remove an image.
pub async fn delete_rbd(
    State(state): State<AppState>,
    Path(image_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.broker.deprovisioner.remove(&image_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /rbd/` with the name left out.
pub async fn delete_unnamed_rbd(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.broker.deprovisioner.remove("").await?;
    Ok(StatusCode::NO_CONTENT)
}
