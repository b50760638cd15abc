use axum::{
    extract::{Path, State},
    Json,
};

use super::RouteState;
use crate::http_objects::{ApiError, DatasetRow};

pub async fn list_dataset(
    State(state): State<RouteState>,
) -> Result<Json<Vec<DatasetRow>>, ApiError> {
    let rows = state
        .dataset
        .list_all()
        .await
        .map_err(|e| ApiError::internal_error(e, "Internal Server Error"))?;
    Ok(Json(rows))
}

pub async fn get_dataset_row(
    Path(id): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<DatasetRow>, ApiError> {
    let row = state
        .dataset
        .get_by_id(&id)
        .await
        .map_err(|e| ApiError::internal_error(e, "Internal Server Error"))?;
    match row {
        Some(row) => Ok(Json(row)),
        None => Err(ApiError::not_found("Dataset not found")),
    }
}

pub async fn get_dataset_category(
    Path(category): Path<String>,
    State(state): State<RouteState>,
) -> Result<Json<Vec<DatasetRow>>, ApiError> {
    let rows = state
        .dataset
        .get_by_category(&category)
        .await
        .map_err(|e| ApiError::internal_error(e, "Internal Server Error"))?;
    Ok(Json(rows))
}
