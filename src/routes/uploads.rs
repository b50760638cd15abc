use axum::{
    extract::{Multipart, State},
    Json,
};
use blob_store::PutResult;
use tracing::info;

use super::RouteState;
use crate::{
    http_objects::{ApiError, StatusMessage},
    upload::UploadError,
};

pub async fn upload_photo(
    State(state): State<RouteState>,
    multipart: Multipart,
) -> Result<Json<StatusMessage>, ApiError> {
    let result = state.uploads.handle(&state.policies.photo, multipart).await;
    finish_upload(result, "Photo uploaded successfully", "Failed to upload photo")
}

pub async fn upload_story(
    State(state): State<RouteState>,
    multipart: Multipart,
) -> Result<Json<StatusMessage>, ApiError> {
    let result = state.uploads.handle(&state.policies.story, multipart).await;
    finish_upload(result, "Story uploaded successfully", "Failed to upload story")
}

fn finish_upload(
    result: Result<PutResult, UploadError>,
    success: &str,
    failure: &str,
) -> Result<Json<StatusMessage>, ApiError> {
    match result {
        Ok(put_result) => {
            info!("stored upload at {}", put_result.url);
            Ok(Json(StatusMessage::ok(success)))
        }
        Err(UploadError::Validation(message)) => Err(ApiError::bad_request(message)),
        Err(UploadError::Store(e)) => Err(ApiError::internal_error(e, failure)),
    }
}
