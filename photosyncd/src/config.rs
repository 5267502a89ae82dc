use std::env::VarError;
use std::path::PathBuf;

use photosync_core::{GithubConfig, LocalConfig, ProviderConfig, S3Config};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PHOTOSYNC_PROVIDER is not set; expected one of s3, github, local")]
    MissingProvider,
    #[error("unknown storage provider: {0}")]
    UnknownProvider(String),
    #[error("missing required environment variable: {0}")]
    MissingVar(String),
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub tenant: String,
    /// `None` falls back to the sqlite file under the platform data dir.
    pub database_url: Option<String>,
    pub provider: ProviderConfig,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Reads configuration through a caller-supplied lookup so tests can
    /// supply variables without mutating process-global state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let tenant = reader("PHOTOSYNC_TENANT").unwrap_or_else(|_| "default".to_string());
        let database_url = reader("PHOTOSYNC_DATABASE_URL").ok();

        let provider = match reader("PHOTOSYNC_PROVIDER") {
            Err(_) => return Err(ConfigError::MissingProvider),
            Ok(name) => match name.as_str() {
                "s3" => ProviderConfig::S3(S3Config {
                    bucket: require(&reader, "PHOTOSYNC_S3_BUCKET")?,
                    region: reader("PHOTOSYNC_S3_REGION").ok(),
                    endpoint: reader("PHOTOSYNC_S3_ENDPOINT").ok(),
                    access_key_id: require(&reader, "PHOTOSYNC_S3_ACCESS_KEY_ID")?,
                    secret_access_key: require(&reader, "PHOTOSYNC_S3_SECRET_ACCESS_KEY")?,
                    public_base_url: reader("PHOTOSYNC_S3_PUBLIC_URL").ok(),
                }),
                "github" => ProviderConfig::Github(GithubConfig {
                    owner: require(&reader, "PHOTOSYNC_GITHUB_OWNER")?,
                    repo: require(&reader, "PHOTOSYNC_GITHUB_REPO")?,
                    branch: reader("PHOTOSYNC_GITHUB_BRANCH")
                        .unwrap_or_else(|_| "main".to_string()),
                    token: require(&reader, "PHOTOSYNC_GITHUB_TOKEN")?,
                    api_base_url: reader("PHOTOSYNC_GITHUB_API_URL").ok(),
                }),
                "local" => ProviderConfig::Local(LocalConfig {
                    root: PathBuf::from(require(&reader, "PHOTOSYNC_LOCAL_ROOT")?),
                }),
                other => return Err(ConfigError::UnknownProvider(other.to_string())),
            },
        };

        Ok(Self {
            tenant,
            database_url,
            provider,
        })
    }
}

fn require<F>(reader: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}
