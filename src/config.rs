use std::{env, net::SocketAddr};

use anyhow::{anyhow, Result};
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingMode {
    /// Hold the whole upload in memory and validate before any store write.
    Buffered,
    /// Spool the upload to a local temporary file, validate after the write.
    Staged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadKindConfig {
    pub staging: StagingMode,
    pub max_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub photo: UploadKindConfig,
    pub story: UploadKindConfig,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        UploadsConfig {
            photo: UploadKindConfig {
                staging: StagingMode::Buffered,
                max_size_bytes: Some(50_000),
            },
            story: UploadKindConfig {
                staging: StagingMode::Staged,
                max_size_bytes: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig {
            secret: "storyverse-dev-secret".to_string(),
            issuer: "storyverse-server".to_string(),
            audience: "storyverse-app".to_string(),
            ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub structured_logging: bool,
    pub blob_storage: BlobStorageConfig,
    pub dataset_object: String,
    pub token: TokenConfig,
    pub uploads: UploadsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
            structured_logging: false,
            blob_storage: Default::default(),
            dataset_object: "dataset.csv".to_string(),
            token: Default::default(),
            uploads: Default::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: Option<&str>) -> Result<ServerConfig> {
        let mut config = match path {
            Some(path) => {
                let config_str = std::fs::read_to_string(path)?;
                Figment::new().merge(Yaml::string(&config_str)).extract()?
            }
            None => ServerConfig::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    // PORT and STORYVERSE_TOKEN_SECRET are supplied by the deployment
    // environment and win over anything in the config file.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = env::var("PORT") {
            self.override_port(&port)?;
        }
        if let Ok(secret) = env::var("STORYVERSE_TOKEN_SECRET") {
            self.token.secret = secret;
        }
        Ok(())
    }

    fn override_port(&mut self, port: &str) -> Result<()> {
        let port: u16 = port
            .parse()
            .map_err(|_| anyhow!("invalid PORT value: {}", port))?;
        let mut addr: SocketAddr = self
            .listen_addr
            .parse()
            .map_err(|_| anyhow!("invalid listen address: {}", self.listen_addr))?;
        addr.set_port(port);
        self.listen_addr = addr.to_string();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.blob_storage.s3.is_some() && self.blob_storage.disk.is_some() {
            return Err(anyhow!("cannot specify both s3 and disk blob storage"));
        }
        if self.blob_storage.s3.is_none() && self.blob_storage.disk.is_none() {
            return Err(anyhow!("must specify one of s3 or disk blob storage"));
        }
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow!("invalid listen address: {}", self.listen_addr));
        }
        if self.token.secret.is_empty() {
            return Err(anyhow!("token secret cannot be empty"));
        }
        Ok(())
    }
}
