use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytes::{Bytes, BytesMut};
use futures::{stream::BoxStream, StreamExt};
use object_store::{
    aws::{AmazonS3, AmazonS3Builder},
    local,
    path::Path,
    ObjectStore,
    WriteMultipart,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskStorageConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    pub s3: Option<S3Config>,
    pub disk: Option<DiskStorageConfig>,
}

impl Default for BlobStorageConfig {
    fn default() -> Self {
        BlobStorageConfig {
            s3: None,
            disk: Some(DiskStorageConfig {
                path: "storyverse_storage/blobs".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub url: String,
    pub size_bytes: u64,
}

fn s3_storage(s3: &S3Config) -> Result<AmazonS3> {
    let mut builder = AmazonS3Builder::from_env().with_region(s3.region.as_str());
    // for localstack/minio endpoints
    if let Ok(endpoint) = std::env::var("AWS_ENDPOINT_URL") {
        builder = builder.with_endpoint(endpoint.clone());
        if endpoint.starts_with("http://") {
            builder = builder.with_allow_http(true);
        }
    }
    builder
        .with_bucket_name(s3.bucket.clone())
        .build()
        .context("unable to build S3 client")
}

fn file_storage(disk: &DiskStorageConfig) -> Result<local::LocalFileSystem> {
    std::fs::create_dir_all(&disk.path)?;
    let s = local::LocalFileSystem::new_with_prefix(&disk.path)?;
    Ok(s)
}

#[derive(Clone)]
pub struct BlobStorage {
    object_store: Arc<dyn ObjectStore>,
    config: BlobStorageConfig,
}

impl BlobStorage {
    pub fn new(config: BlobStorageConfig) -> Result<Self> {
        let object_store: Arc<dyn ObjectStore> = if let Some(s3) = config.s3.as_ref() {
            info!("using s3 blob store, bucket: {}", s3.bucket);
            Arc::new(s3_storage(s3)?)
        } else {
            // If it's not S3, assume it's a file
            let disk = config.disk.clone().unwrap_or_else(|| DiskStorageConfig {
                path: "storyverse_storage/blobs".to_string(),
            });
            info!("using disk blob store, path: {}", disk.path);
            Arc::new(file_storage(&disk)?)
        };
        Ok(Self {
            object_store,
            config,
        })
    }

    pub async fn put(
        &self,
        key: &str,
        mut data: impl futures::Stream<Item = Result<Bytes>> + Send + Unpin,
    ) -> Result<PutResult, anyhow::Error> {
        let path = Path::from(key);
        let m = self.object_store.put_multipart(&path).await?;
        let mut w = WriteMultipart::new(m);
        let mut size_bytes = 0;
        while let Some(chunk) = data.next().await {
            w.wait_for_capacity(1).await?;
            let chunk = chunk?;
            size_bytes += chunk.len() as u64;
            w.write(&chunk);
        }
        w.finish().await?;
        Ok(PutResult {
            url: self.path_url(&path),
            size_bytes,
        })
    }

    pub fn path_url(&self, path: &Path) -> String {
        if let Some(s3) = &self.config.s3 {
            format!("s3://{}/{}", s3.bucket, path)
        } else if let Some(disk) = &self.config.disk {
            format!("file://{}/{}", disk.path, path)
        } else {
            path.to_string()
        }
    }

    pub async fn get(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let client = self.object_store.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let get_result = client
            .get(&Path::from(key))
            .await
            .map_err(|e| anyhow!("can't get object {:?}: {:?}", key, e))?;
        let key = key.to_string();
        tokio::spawn(async move {
            let mut stream = get_result.into_stream();
            while let Some(chunk) = stream.next().await {
                if tx
                    .send(chunk.map_err(|e| anyhow!("error reading object {:?}: {:?}", key, e)))
                    .is_err()
                {
                    // receiver dropped, stop reading
                    break;
                }
            }
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    pub async fn read_bytes(&self, key: &str) -> Result<Bytes> {
        let mut reader = self.get(key).await?;
        let mut bytes = BytesMut::new();
        while let Some(chunk) = reader.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes.into())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.object_store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.object_store.delete(&Path::from(key)).await?;
        Ok(())
    }
}
