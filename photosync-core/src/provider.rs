use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::github::GithubProvider;
use crate::local::LocalProvider;
use crate::s3::S3Provider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("invalid provider configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageObject {
    pub key: String,
    pub size: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn list_objects(&self) -> Result<Vec<StorageObject>, ProviderError>;
    async fn upload_file(&self, key: &str, bytes: Vec<u8>) -> Result<(), ProviderError>;
    async fn delete_file(&self, key: &str) -> Result<(), ProviderError>;
    fn generate_public_url(&self, key: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    S3(S3Config),
    Github(GithubConfig),
    Local(LocalConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub token: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub root: PathBuf,
}

impl ProviderConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            ProviderConfig::S3(_) => "s3",
            ProviderConfig::Github(_) => "github",
            ProviderConfig::Local(_) => "local",
        }
    }

    pub fn build(&self) -> Result<Arc<dyn StorageProvider>, ProviderError> {
        match self {
            ProviderConfig::S3(config) => Ok(Arc::new(S3Provider::new(config)?)),
            ProviderConfig::Github(config) => Ok(Arc::new(GithubProvider::new(config)?)),
            ProviderConfig::Local(config) => Ok(Arc::new(LocalProvider::new(config.root.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_parses_tagged_json() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{
                "type": "github",
                "owner": "acme",
                "repo": "photos",
                "token": "t"
            }"#,
        )
        .unwrap();

        assert_eq!(config.provider_name(), "github");
        match config {
            ProviderConfig::Github(github) => {
                assert_eq!(github.owner, "acme");
                assert_eq!(github.branch, "main");
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn local_config_builds_provider() {
        let config = ProviderConfig::Local(LocalConfig {
            root: PathBuf::from("/tmp/photos"),
        });
        let provider = config.build().unwrap();
        assert_eq!(provider.name(), "local");
    }
}
