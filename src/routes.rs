use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

mod auth;
mod dataset;
mod uploads;

use auth::{login, register};
use dataset::{get_dataset_category, get_dataset_row, list_dataset};
use uploads::{upload_photo, upload_story};

use crate::{
    dataset::DatasetService,
    token_issuer::TokenIssuer,
    upload::{UploadGatekeeper, UploadPolicies},
    user_store::UserStore,
};

#[derive(Clone)]
pub struct RouteState {
    pub user_store: Arc<dyn UserStore>,
    pub token_issuer: Arc<dyn TokenIssuer>,
    pub dataset: Arc<DatasetService>,
    pub uploads: Arc<UploadGatekeeper>,
    pub policies: Arc<UploadPolicies>,
}

pub fn create_routes(route_state: RouteState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route(
            "/api/register",
            post(register).with_state(route_state.clone()),
        )
        .route("/api/login", post(login).with_state(route_state.clone()))
        .route(
            "/api/dataset",
            get(list_dataset).with_state(route_state.clone()),
        )
        .route(
            "/api/dataset/{id}",
            get(get_dataset_row).with_state(route_state.clone()),
        )
        .route(
            "/api/dataset/category/{category}",
            get(get_dataset_category).with_state(route_state.clone()),
        )
        .route(
            "/api/upload/foto",
            post(upload_photo).with_state(route_state.clone()),
        )
        .route(
            "/api/upload/stories",
            post(upload_story).with_state(route_state.clone()),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();

                    let matched_path = req
                        .extensions()
                        .get::<MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::debug_span!("request", %method, %uri, matched_path)
                })
                .on_failure(()),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::max(usize::MAX))
}

async fn index() -> &'static str {
    "Storyverse Server"
}
