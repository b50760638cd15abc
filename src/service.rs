use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStorage;
use tokio::signal;
use tracing::info;

use crate::{
    config::ServerConfig,
    dataset::{enrich::HttpArticleFetcher, DatasetService},
    routes::{create_routes, RouteState},
    token_issuer::{HmacTokenIssuer, TokenIssuer},
    upload::{UploadGatekeeper, UploadPolicies},
    user_store::{BlobUserStore, UserStore},
};

#[derive(Clone)]
pub struct Service {
    pub config: ServerConfig,
    pub handle: Handle,
    pub blob_storage: Arc<BlobStorage>,
    pub user_store: Arc<dyn UserStore>,
    pub token_issuer: Arc<dyn TokenIssuer>,
    pub dataset: Arc<DatasetService>,
    pub uploads: Arc<UploadGatekeeper>,
    pub policies: Arc<UploadPolicies>,
}

impl Service {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let blob_storage = Arc::new(
            BlobStorage::new(config.blob_storage.clone())
                .context("error initializing BlobStorage")?,
        );
        let user_store: Arc<dyn UserStore> = Arc::new(BlobUserStore::new(blob_storage.clone()));
        let token_issuer: Arc<dyn TokenIssuer> =
            Arc::new(HmacTokenIssuer::new(config.token.clone()));
        let dataset = Arc::new(DatasetService::new(
            blob_storage.clone(),
            config.dataset_object.clone(),
            Arc::new(HttpArticleFetcher::new()),
        ));
        let uploads = Arc::new(UploadGatekeeper::new(blob_storage.clone()));
        let policies = Arc::new(UploadPolicies::new(&config.uploads));

        Ok(Self {
            config,
            handle: Handle::new(),
            blob_storage,
            user_store,
            token_issuer,
            dataset,
            uploads,
            policies,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let route_state = RouteState {
            user_store: self.user_store.clone(),
            token_issuer: self.token_issuer.clone(),
            dataset: self.dataset.clone(),
            uploads: self.uploads.clone(),
            policies: self.policies.clone(),
        };

        let handle = self.handle.clone();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        let routes = create_routes(route_state);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    info!("signal received, shutting down server gracefully");
}
