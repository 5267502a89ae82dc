use futures_util::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use time::OffsetDateTime;

use crate::provider::{ProviderError, S3Config, StorageObject, StorageProvider};

const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Provider {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    public_base_url: Option<String>,
}

impl S3Provider {
    pub fn new(config: &S3Config) -> Result<Self, ProviderError> {
        let region = config
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let store = builder.build()?;

        Ok(Self {
            store,
            bucket: config.bucket.clone(),
            region,
            endpoint: config.endpoint.clone(),
            public_base_url: config.public_base_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl StorageProvider for S3Provider {
    fn name(&self) -> &str {
        "s3"
    }

    async fn list_objects(&self) -> Result<Vec<StorageObject>, ProviderError> {
        let mut stream = self.store.list(None);
        let mut objects = Vec::new();
        while let Some(meta) = stream.next().await {
            let meta = meta?;
            objects.push(StorageObject {
                key: meta.location.as_ref().to_string(),
                size: i64::try_from(meta.size).ok(),
                etag: meta.e_tag.map(|tag| tag.trim_matches('"').to_string()),
                last_modified: OffsetDateTime::from_unix_timestamp(meta.last_modified.timestamp())
                    .ok(),
            });
        }
        Ok(objects)
    }

    async fn upload_file(&self, key: &str, bytes: Vec<u8>) -> Result<(), ProviderError> {
        self.store
            .put(&Path::from(key), PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<(), ProviderError> {
        match self.store.delete(&Path::from(key)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(ProviderError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn generate_public_url(&self, key: &str) -> Result<String, ProviderError> {
        if let Some(base) = &self.public_base_url {
            return Ok(format!("{}/{}", base.trim_end_matches('/'), key));
        }
        if let Some(endpoint) = &self.endpoint {
            return Ok(format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                key
            ));
        }
        Ok(format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        ))
    }
}
