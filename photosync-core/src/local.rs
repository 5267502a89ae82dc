use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use time::OffsetDateTime;
use url::Url;

use crate::provider::{ProviderError, StorageObject, StorageProvider};

pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ProviderError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(ProviderError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_objects(&self) -> Result<Vec<StorageObject>, ProviderError> {
        let mut pending = vec![self.root.clone()];
        let mut objects = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let path = entry.path();
                let key = path
                    .strip_prefix(&self.root)
                    .map_err(|_| ProviderError::InvalidKey(path.display().to_string()))?
                    .to_string_lossy()
                    .replace('\\', "/");
                let metadata = entry.metadata().await?;
                let bytes = tokio::fs::read(&path).await?;
                let last_modified = metadata.modified().ok().map(OffsetDateTime::from);

                objects.push(StorageObject {
                    key,
                    size: i64::try_from(metadata.len()).ok(),
                    etag: Some(format!("{:x}", md5::compute(&bytes))),
                    last_modified,
                });
            }
        }

        // Directory traversal order is filesystem-dependent.
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn upload_file(&self, key: &str, bytes: Vec<u8>) -> Result<(), ProviderError> {
        let target = self.resolve(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<(), ProviderError> {
        let target = self.resolve(key)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ProviderError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn generate_public_url(&self, key: &str) -> Result<String, ProviderError> {
        let target = self.resolve(key)?;
        let url = Url::from_file_path(&target)
            .map_err(|_| ProviderError::InvalidKey(target.display().to_string()))?;
        Ok(url.to_string())
    }
}
