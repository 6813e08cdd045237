//! Runtime HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{DerivedModelAsset, ModelAsset, Overlay};
use crate::error::{Error, Result};
use crate::port::outbound::RuntimeApi;

const DRIVER: &str = "runtime-api";

/// Client for the runtime's local REST API.
#[derive(Debug, Clone)]
pub struct OllamaApi {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl OllamaApi {
    /// Create a client for `base_url`; `timeout` bounds short requests.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base: Url::parse(base_url)?,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    model: &'a str,
    from: &'a str,
    parameters: &'a Overlay,
    stream: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    keep_alive: &'a str,
    stream: bool,
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::driver(
        DRIVER,
        format!("HTTP {}: {}", status.as_u16(), body.trim()),
    ))
}

#[async_trait]
impl RuntimeApi for OllamaApi {
    async fn version(&self) -> Result<String> {
        let response = self
            .client
            .get(self.endpoint("/api/version")?)
            .timeout(self.timeout)
            .send()
            .await?;
        let body: VersionResponse = ensure_success(response).await?.json().await?;
        Ok(body.version)
    }

    async fn list_models(&self) -> Result<Vec<ModelAsset>> {
        let response = self
            .client
            .get(self.endpoint("/api/tags")?)
            .timeout(self.timeout)
            .send()
            .await?;
        let body: TagsResponse = ensure_success(response).await?.json().await?;
        Ok(body
            .models
            .into_iter()
            .map(|entry| ModelAsset::new(entry.name))
            .collect())
    }

    async fn create_derived(&self, asset: &DerivedModelAsset, timeout: Duration) -> Result<()> {
        let request = CreateRequest {
            model: &asset.name,
            from: &asset.base,
            parameters: &asset.overlay,
            stream: false,
        };
        let response = self
            .client
            .post(self.endpoint("/api/create")?)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    Error::Timeout(timeout)
                } else {
                    Error::Http(error)
                }
            })?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn preload(&self, model: &str, keep_alive: &str) -> Result<()> {
        let request = GenerateRequest {
            model,
            keep_alive,
            stream: false,
        };
        // Loading a model can take far longer than a metadata request.
        let response = self
            .client
            .post(self.endpoint("/api/generate")?)
            .timeout(self.timeout * 30)
            .json(&request)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_carries_overlay_as_parameters() {
        let overlay = Overlay {
            num_gpu: 999,
            num_thread: 8,
            num_ctx: 8192,
            temperature: 0.7,
            top_p: 0.9,
            repeat_penalty: 1.1,
        };
        let request = CreateRequest {
            model: "llama3-maxgpu",
            from: "llama3:latest",
            parameters: &overlay,
            stream: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "llama3-maxgpu");
        assert_eq!(value["from"], "llama3:latest");
        assert_eq!(value["parameters"]["num_gpu"], 999);
        assert_eq!(value["parameters"]["num_ctx"], 8192);
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn tags_response_tolerates_missing_models() {
        let body: TagsResponse = serde_json::from_str("{}").unwrap();
        assert!(body.models.is_empty());

        let body: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"llama3:latest","size":1}]}"#).unwrap();
        assert_eq!(body.models[0].name, "llama3:latest");
    }

    #[test]
    fn endpoints_join_onto_base() {
        let api = OllamaApi::new("http://127.0.0.1:11434", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.endpoint("/api/tags").unwrap().as_str(),
            "http://127.0.0.1:11434/api/tags"
        );
    }
}
