use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::anyhow;
use axum::extract::{multipart::Field, Multipart};
use blob_store::{BlobStorage, PutResult};
use bytes::BytesMut;
use futures::{stream, StreamExt};
use tempfile::NamedTempFile;
use tokio_util::io::ReaderStream;

use crate::config::{StagingMode, UploadKindConfig, UploadsConfig};

pub const NO_FILE: &str = "No file uploaded";
pub const FILE_TOO_LARGE: &str = "File too large";
pub const DISALLOWED_TYPE: &str = "Only JPEG and PNG file formats are allowed";

#[derive(Debug)]
pub enum UploadError {
    Validation(&'static str),
    Store(anyhow::Error),
}

/// Validation and placement rules for one upload endpoint.
pub struct UploadPolicy {
    field_names: &'static [&'static str],
    prefix: &'static str,
    allowed_types: Option<&'static [&'static str]>,
    force_extension: Option<&'static str>,
    staging: StagingMode,
    max_size_bytes: Option<u64>,
}

impl UploadPolicy {
    pub fn photo(config: &UploadKindConfig) -> Self {
        UploadPolicy {
            field_names: &["foto"],
            prefix: "Upload_foto/",
            allowed_types: Some(&["jpeg", "jpg", "png"]),
            force_extension: None,
            staging: config.staging,
            max_size_bytes: config.max_size_bytes,
        }
    }

    pub fn story(config: &UploadKindConfig) -> Self {
        UploadPolicy {
            field_names: &["file", "stories"],
            prefix: "Upload_stories/",
            allowed_types: None,
            force_extension: Some("txt"),
            staging: config.staging,
            max_size_bytes: config.max_size_bytes,
        }
    }

    fn accepts_field(&self, name: &str) -> bool {
        self.field_names.contains(&name)
    }

    // The extension must be in the allow-list exactly; the MIME type
    // only has to contain one of the allowed names, so image/jpeg,
    // image/jpg and image/png all pass.
    fn check_type(&self, file_name: &str, content_type: Option<&str>) -> Result<(), UploadError> {
        let Some(allowed) = self.allowed_types else {
            return Ok(());
        };
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        let extension_ok = allowed.contains(&extension.as_str());
        let mime = content_type.unwrap_or_default().to_lowercase();
        let mime_ok = allowed.iter().any(|t| mime.contains(t));
        if extension_ok && mime_ok {
            Ok(())
        } else {
            Err(UploadError::Validation(DISALLOWED_TYPE))
        }
    }

    fn check_size(&self, size_bytes: u64) -> Result<(), UploadError> {
        match self.max_size_bytes {
            Some(max) if size_bytes > max => Err(UploadError::Validation(FILE_TOO_LARGE)),
            _ => Ok(()),
        }
    }

    /// Object key for an accepted upload. Only the basename of the
    /// client-supplied filename is used, so names cannot escape the
    /// kind's prefix.
    fn object_key(&self, file_name: &str) -> String {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        match self.force_extension {
            Some(extension) => {
                let stem = Path::new(base)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("upload");
                format!("{}{}.{}", self.prefix, stem, extension)
            }
            None => format!("{}{}", self.prefix, base),
        }
    }
}

/// The two upload kinds the server accepts, built once from config.
pub struct UploadPolicies {
    pub photo: UploadPolicy,
    pub story: UploadPolicy,
}

impl UploadPolicies {
    pub fn new(config: &UploadsConfig) -> Self {
        Self {
            photo: UploadPolicy::photo(&config.photo),
            story: UploadPolicy::story(&config.story),
        }
    }
}

pub struct UploadGatekeeper {
    storage: Arc<BlobStorage>,
    staging_dir: PathBuf,
}

impl UploadGatekeeper {
    pub fn new(storage: Arc<BlobStorage>) -> Self {
        Self::with_staging_dir(storage, std::env::temp_dir())
    }

    /// Staged uploads spool under `staging_dir` before the store write.
    pub fn with_staging_dir(storage: Arc<BlobStorage>, staging_dir: PathBuf) -> Self {
        Self {
            storage,
            staging_dir,
        }
    }

    /// Pulls the first acceptable file field out of the multipart body,
    /// validates it against the policy and hands it to the blob store.
    /// Fields the policy does not name are skipped.
    pub async fn handle(
        &self,
        policy: &UploadPolicy,
        mut multipart: Multipart,
    ) -> Result<PutResult, UploadError> {
        loop {
            let field = multipart
                .next_field()
                .await
                .map_err(|e| UploadError::Store(anyhow!("error reading multipart body: {}", e)))?;
            let Some(field) = field else {
                return Err(UploadError::Validation(NO_FILE));
            };
            let Some(name) = field.name().map(|n| n.to_string()) else {
                continue;
            };
            if !policy.accepts_field(&name) {
                continue;
            }
            let Some(file_name) = field.file_name().map(|n| n.to_string()) else {
                continue;
            };
            let content_type = field.content_type().map(|c| c.to_string());

            policy.check_type(&file_name, content_type.as_deref())?;

            let key = policy.object_key(&file_name);
            return match policy.staging {
                StagingMode::Buffered => self.put_buffered(policy, &key, field).await,
                StagingMode::Staged => self.put_staged(policy, &key, field).await,
            };
        }
    }

    // Collects the field in memory, rejecting as soon as the ceiling is
    // crossed, and only then writes to the store.
    async fn put_buffered(
        &self,
        policy: &UploadPolicy,
        key: &str,
        mut field: Field<'_>,
    ) -> Result<PutResult, UploadError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| UploadError::Store(anyhow!("error reading upload: {}", e)))?
        {
            buf.extend_from_slice(&chunk);
            policy.check_size(buf.len() as u64)?;
        }
        self.storage
            .put(key, stream::iter(vec![Ok(buf.freeze())]))
            .await
            .map_err(UploadError::Store)
    }

    // Spools the field to a local temporary file and validates after the
    // write. The temporary file is removed on drop on every exit path.
    async fn put_staged(
        &self,
        policy: &UploadPolicy,
        key: &str,
        mut field: Field<'_>,
    ) -> Result<PutResult, UploadError> {
        let mut staged = NamedTempFile::new_in(&self.staging_dir)
            .map_err(|e| UploadError::Store(anyhow!("error creating staging file: {}", e)))?;
        let mut size_bytes: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| UploadError::Store(anyhow!("error reading upload: {}", e)))?
        {
            size_bytes += chunk.len() as u64;
            staged
                .write_all(&chunk)
                .map_err(|e| UploadError::Store(anyhow!("error staging upload: {}", e)))?;
        }
        policy.check_size(size_bytes)?;

        let file = tokio::fs::File::open(staged.path())
            .await
            .map_err(|e| UploadError::Store(anyhow!("error reopening staging file: {}", e)))?;
        let data = ReaderStream::new(file).map(|chunk| chunk.map_err(|e| anyhow!(e)));
        self.storage.put(key, data).await.map_err(UploadError::Store)
    }
}
