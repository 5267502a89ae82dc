use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

use crate::provider::{ProviderError, StorageObject, StorageProvider};

pub const MANIFEST_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("time format error: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("processing failed: {0}")]
    Processing(String),
}

/// Versioned, schema-tagged metadata payload. The reconciliation engine
/// stores it verbatim and never inspects `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoManifest {
    pub version: i64,
    pub data: JsonValue,
}

#[async_trait]
pub trait ManifestExtractor: Send + Sync {
    async fn extract(
        &self,
        object: &StorageObject,
        companion: Option<&StorageObject>,
        provider: &dyn StorageProvider,
    ) -> Result<PhotoManifest, ExtractorError>;
}

/// Builds a manifest from listing metadata alone, without downloading or
/// decoding the object bytes.
pub struct BasicManifestExtractor;

#[async_trait]
impl ManifestExtractor for BasicManifestExtractor {
    async fn extract(
        &self,
        object: &StorageObject,
        companion: Option<&StorageObject>,
        provider: &dyn StorageProvider,
    ) -> Result<PhotoManifest, ExtractorError> {
        let file_name = object
            .key
            .rsplit('/')
            .next()
            .unwrap_or(object.key.as_str());
        let mut data = json!({
            "fileName": file_name,
            "mediaUrl": provider.generate_public_url(&object.key)?,
        });
        if let Some(extension) = key_extension(&object.key) {
            data["extension"] = json!(extension);
        }
        if let Some(size) = object.size {
            data["sizeBytes"] = json!(size);
        }
        if let Some(etag) = &object.etag {
            data["etag"] = json!(etag);
        }
        if let Some(last_modified) = object.last_modified {
            data["lastModified"] = json!(last_modified.format(&Rfc3339)?);
        }
        if let Some(companion) = companion {
            data["livePhotoVideoUrl"] = json!(provider.generate_public_url(&companion.key)?);
        }

        Ok(PhotoManifest {
            version: MANIFEST_VERSION,
            data,
        })
    }
}

pub fn key_extension(key: &str) -> Option<String> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryProvider;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn basic_extractor_builds_manifest_from_listing_metadata() {
        let provider = MemoryProvider::new();
        let object = StorageObject {
            key: "2024/IMG_0001.HEIC".into(),
            size: Some(2048),
            etag: Some("abc123".into()),
            last_modified: Some(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()),
        };
        let companion = StorageObject {
            key: "2024/IMG_0001.MOV".into(),
            size: Some(4096),
            etag: Some("def456".into()),
            last_modified: None,
        };

        let manifest = BasicManifestExtractor
            .extract(&object, Some(&companion), &provider)
            .await
            .unwrap();

        assert_eq!(manifest.version, MANIFEST_VERSION);
        assert_eq!(manifest.data["fileName"], "IMG_0001.HEIC");
        assert_eq!(manifest.data["extension"], "heic");
        assert_eq!(manifest.data["sizeBytes"], 2048);
        assert_eq!(manifest.data["mediaUrl"], "memory://2024/IMG_0001.HEIC");
        assert_eq!(
            manifest.data["livePhotoVideoUrl"],
            "memory://2024/IMG_0001.MOV"
        );
        assert_eq!(manifest.data["lastModified"], "2023-11-14T22:13:20Z");
    }

    #[tokio::test]
    async fn absent_metadata_fields_are_omitted() {
        let provider = MemoryProvider::new();
        let object = StorageObject {
            key: "img".into(),
            size: None,
            etag: None,
            last_modified: None,
        };

        let manifest = BasicManifestExtractor
            .extract(&object, None, &provider)
            .await
            .unwrap();

        assert_eq!(manifest.data["fileName"], "img");
        assert!(manifest.data.get("extension").is_none());
        assert!(manifest.data.get("sizeBytes").is_none());
        assert!(manifest.data.get("livePhotoVideoUrl").is_none());
    }

    #[test]
    fn key_extension_is_lowercased_and_requires_a_stem() {
        assert_eq!(key_extension("a/b/IMG.JPG").as_deref(), Some("jpg"));
        assert_eq!(key_extension(".hidden"), None);
        assert_eq!(key_extension("noext"), None);
        assert_eq!(key_extension("dir.d/noext"), None);
    }
}
