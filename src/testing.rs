use std::net::SocketAddr;

use anyhow::{anyhow, Result};
use blob_store::{BlobStorageConfig, DiskStorageConfig};
use bytes::Bytes;
use futures::stream;
use tempfile::TempDir;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{config::ServerConfig, service::Service};

/// A full service bound to an ephemeral port, backed by a temporary
/// blob directory that lives as long as the harness.
pub struct TestService {
    pub service: Service,
    pub addr: SocketAddr,
    _temp_dir: TempDir,
}

impl TestService {
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(mutate: impl FnOnce(&mut ServerConfig)) -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;

        let mut config = ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            blob_storage: BlobStorageConfig {
                s3: None,
                disk: Some(DiskStorageConfig {
                    path: temp_dir
                        .path()
                        .join("blob_store")
                        .to_str()
                        .unwrap()
                        .to_string(),
                }),
            },
            ..Default::default()
        };
        mutate(&mut config);

        let service = Service::new(config)?;
        let server = service.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                ::tracing::error!("test server exited: {:?}", e);
            }
        });
        let addr = service
            .handle
            .listening()
            .await
            .ok_or_else(|| anyhow!("test server failed to bind"))?;

        Ok(Self {
            service,
            addr,
            _temp_dir: temp_dir,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn put_dataset(&self, csv: &str) -> Result<()> {
        self.service
            .blob_storage
            .put(
                &self.service.config.dataset_object,
                stream::iter(vec![Ok(Bytes::copy_from_slice(csv.as_bytes()))]),
            )
            .await?;
        Ok(())
    }
}
