mod github;
mod local;
mod manifest;
mod memory;
mod provider;
mod s3;

pub use github::GithubProvider;
pub use local::LocalProvider;
pub use manifest::{
    BasicManifestExtractor, ExtractorError, MANIFEST_VERSION, ManifestExtractor, PhotoManifest,
    key_extension,
};
pub use memory::MemoryProvider;
pub use provider::{
    GithubConfig, LocalConfig, ProviderConfig, ProviderError, S3Config, StorageObject,
    StorageProvider,
};
pub use s3::S3Provider;
