use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::provider::{GithubConfig, ProviderError, StorageObject, StorageProvider};

const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "photosync";

pub struct GithubProvider {
    http: Client,
    api_base: Url,
    owner: String,
    repo: String,
    branch: String,
    token: String,
}

impl GithubProvider {
    pub fn new(config: &GithubConfig) -> Result<Self, ProviderError> {
        let api_base = match &config.api_base_url {
            Some(value) => Url::parse(value)?,
            None => Url::parse(DEFAULT_API_URL)?,
        };
        Ok(Self {
            http: Client::new(),
            api_base,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.api_base.join(path)?)
    }

    fn contents_endpoint(&self, key: &str) -> Result<Url, ProviderError> {
        self.endpoint(&format!(
            "/repos/{}/{}/contents/{}",
            self.owner, self.repo, key
        ))
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }

    async fn find_content_sha(&self, key: &str) -> Result<Option<String>, ProviderError> {
        let mut url = self.contents_endpoint(key)?;
        url.query_pairs_mut().append_pair("ref", &self.branch);
        let response = self.authed(self.http.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let info: ContentInfo = Self::handle_response(response).await?;
        Ok(Some(info.sha))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Api { status, body })
        }
    }

    async fn handle_unit(response: reqwest::Response) -> Result<(), ProviderError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Api { status, body })
        }
    }
}

#[async_trait::async_trait]
impl StorageProvider for GithubProvider {
    fn name(&self) -> &str {
        "github"
    }

    async fn list_objects(&self) -> Result<Vec<StorageObject>, ProviderError> {
        let mut url = self.endpoint(&format!(
            "/repos/{}/{}/git/trees/{}",
            self.owner, self.repo, self.branch
        ))?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let response = self.authed(self.http.get(url)).send().await?;
        let tree: TreeResponse = Self::handle_response(response).await?;

        // The trees API carries no per-entry timestamps; blob SHAs stand in
        // for etags. Truncated listings (>100k entries) return what fits.
        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.entry_type == "blob")
            .map(|entry| StorageObject {
                key: entry.path,
                size: entry.size,
                etag: Some(entry.sha),
                last_modified: None,
            })
            .collect())
    }

    async fn upload_file(&self, key: &str, bytes: Vec<u8>) -> Result<(), ProviderError> {
        let existing_sha = self.find_content_sha(key).await?;
        let url = self.contents_endpoint(key)?;
        let mut body = serde_json::json!({
            "message": format!("photosync: upload {key}"),
            "content": BASE64.encode(&bytes),
            "branch": self.branch,
        });
        if let Some(sha) = existing_sha {
            body["sha"] = serde_json::Value::String(sha);
        }
        let response = self.authed(self.http.put(url)).json(&body).send().await?;
        Self::handle_unit(response).await
    }

    async fn delete_file(&self, key: &str) -> Result<(), ProviderError> {
        let sha = self
            .find_content_sha(key)
            .await?
            .ok_or_else(|| ProviderError::NotFound(key.to_string()))?;
        let url = self.contents_endpoint(key)?;
        let body = serde_json::json!({
            "message": format!("photosync: delete {key}"),
            "sha": sha,
            "branch": self.branch,
        });
        let response = self
            .authed(self.http.delete(url))
            .json(&body)
            .send()
            .await?;
        Self::handle_unit(response).await
    }

    fn generate_public_url(&self, key: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "https://raw.githubusercontent.com/{}/{}/{}/{}",
            self.owner, self.repo, self.branch, key
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    sha: String,
    #[serde(default)]
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: String,
}
