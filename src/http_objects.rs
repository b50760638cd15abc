use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    status_code: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status_code: StatusCode, message: &str) -> Self {
        Self {
            status_code,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_error(e: anyhow::Error, message: &str) -> Self {
        error!("internal error: {:?}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

// Every error response carries the same body shape, so clients only
// ever branch on the status code and `message`.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API Error: {} - {}", self.status_code, self.message);
        (
            self.status_code,
            Json(json!({"error": true, "message": self.message})),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub error: bool,
    pub message: String,
}

impl StatusMessage {
    pub fn ok(message: &str) -> Self {
        Self {
            error: false,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user_id: String,
    pub name: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub error: bool,
    pub message: String,
    #[serde(rename = "loginResult")]
    pub login_result: LoginResult,
}

/// A dataset row as returned to clients. The field names and their order
/// mirror the CSV header columns, with `id`, `article` and
/// `CategoryCoverImage` filled in (or left out) depending on the operation
/// that produced the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Created_date")]
    pub created_date: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(
        rename = "CategoryCoverImage",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_cover_image: Option<String>,
}
