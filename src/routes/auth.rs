use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::RouteState;
use crate::http_objects::{
    ApiError,
    LoginRequest,
    LoginResponse,
    LoginResult,
    RegisterRequest,
    StatusMessage,
};

pub async fn register(
    State(state): State<RouteState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.password.chars().count() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let existing = state
        .user_store
        .find_by_email(&request.email)
        .await
        .map_err(|e| ApiError::internal_error(e, "Failed to register user"))?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Email already exists"));
    }

    state
        .user_store
        .insert(&request.name, &request.email, &request.password)
        .await
        .map_err(|e| ApiError::internal_error(e, "Failed to register user"))?;

    Ok((
        StatusCode::CREATED,
        Json(StatusMessage::ok("User Created")),
    ))
}

pub async fn login(
    State(state): State<RouteState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .user_store
        .find_by_email(&request.email)
        .await
        .map_err(|e| ApiError::internal_error(e, "Failed to login"))?;
    let Some(user) = user else {
        return Err(ApiError::not_found("User not found"));
    };

    if user.password != request.password {
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let token = state
        .token_issuer
        .mint(&user.id)
        .await
        .map_err(|e| ApiError::internal_error(e, "Failed to login"))?;

    Ok(Json(LoginResponse {
        error: false,
        message: "Success".to_string(),
        login_result: LoginResult {
            user_id: user.id,
            name: user.name,
            token,
        },
    }))
}
