pub mod types;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use types::{parse_spec_items, SelectOutcome, SpecItem, SpecKind, VariantStatus};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("could not read {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The studio backend as seen by the preview. Implemented over HTTP by
/// [`BackendClient`]; tests substitute in-memory fakes.
pub trait ResourceBackend: Send + Sync {
    fn fetch_spec(
        &self,
        project_id: &str,
        kind: SpecKind,
    ) -> impl Future<Output = Result<Vec<SpecItem>, BackendError>> + Send;

    fn fetch_variants(
        &self,
        project_id: &str,
        kind: SpecKind,
        item_id: &str,
    ) -> impl Future<Output = Result<VariantStatus, BackendError>> + Send;

    fn select_variant(
        &self,
        project_id: &str,
        kind: SpecKind,
        item_id: &str,
        variant_id: &str,
    ) -> impl Future<Output = Result<SelectOutcome, BackendError>> + Send;
}

#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, BackendError> {
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;
        decode_json(url, response).await
    }

    /// Downloads raw bytes of an asset (images, sheets).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::new(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }

    /// Uploads a replacement animation sheet for one action type
    /// (`full`, `idle`, `walk`, `attack`).
    pub async fn upload_animation(
        &self,
        project_id: &str,
        item_id: &str,
        anim_type: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<serde_json::Value, BackendError> {
        let url = self.api_url(&format!("/resources/{project_id}/upload-animations"));
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;
        let form = reqwest::multipart::Form::new()
            .text("item_id", item_id.to_string())
            .text("anim_type", anim_type.to_string())
            .part("file", part);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;
        decode_json(url, response).await
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    url: String,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| BackendError::Transport {
            url: url.clone(),
            source,
        })?;
    if !status.is_success() {
        return Err(BackendError::Status {
            url,
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|e| BackendError::Decode {
        url,
        reason: e.to_string(),
    })
}

impl ResourceBackend for BackendClient {
    async fn fetch_spec(&self, project_id: &str, kind: SpecKind) -> Result<Vec<SpecItem>, BackendError> {
        let url = self.api_url(&format!("/documents/{project_id}/specs/{}", kind.as_str()));
        let payload: serde_json::Value = self.get_json(url).await?;
        Ok(parse_spec_items(&payload, kind))
    }

    async fn fetch_variants(
        &self,
        project_id: &str,
        kind: SpecKind,
        item_id: &str,
    ) -> Result<VariantStatus, BackendError> {
        let url = self.api_url(&format!(
            "/resources/{project_id}/{}/{item_id}/variants",
            kind.as_str()
        ));
        self.get_json(url).await
    }

    async fn select_variant(
        &self,
        project_id: &str,
        kind: SpecKind,
        item_id: &str,
        variant_id: &str,
    ) -> Result<SelectOutcome, BackendError> {
        let url = self.api_url(&format!(
            "/resources/{project_id}/{}/{item_id}/select/{variant_id}",
            kind.as_str()
        ));
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;
        decode_json(url, response).await
    }
}
