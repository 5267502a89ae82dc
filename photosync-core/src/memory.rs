use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;

use crate::provider::{ProviderError, StorageObject, StorageProvider};

#[derive(Debug, Clone)]
struct MemoryObject {
    bytes: Vec<u8>,
    etag: String,
    last_modified: OffsetDateTime,
}

/// In-memory provider with a deterministic (key-ordered) listing, used by
/// engine tests and demos. Not reachable from configuration.
#[derive(Default)]
pub struct MemoryProvider {
    objects: Mutex<BTreeMap<String, MemoryObject>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, bytes: &[u8], last_modified: OffsetDateTime) -> Self {
        self.insert_object(key, bytes, last_modified);
        self
    }

    pub fn insert_object(&self, key: &str, bytes: &[u8], last_modified: OffsetDateTime) {
        self.lock().insert(
            key.to_string(),
            MemoryObject {
                bytes: bytes.to_vec(),
                etag: format!("{:x}", md5::compute(bytes)),
                last_modified,
            },
        );
    }

    pub fn remove_object(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn object_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, MemoryObject>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_objects(&self) -> Result<Vec<StorageObject>, ProviderError> {
        Ok(self
            .lock()
            .iter()
            .map(|(key, object)| StorageObject {
                key: key.clone(),
                size: i64::try_from(object.bytes.len()).ok(),
                etag: Some(object.etag.clone()),
                last_modified: Some(object.last_modified),
            })
            .collect())
    }

    async fn upload_file(&self, key: &str, bytes: Vec<u8>) -> Result<(), ProviderError> {
        self.insert_object(key, &bytes, OffsetDateTime::now_utc());
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<(), ProviderError> {
        if self.remove_object(key) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(key.to_string()))
        }
    }

    fn generate_public_url(&self, key: &str) -> Result<String, ProviderError> {
        Ok(format!("memory://{key}"))
    }
}
