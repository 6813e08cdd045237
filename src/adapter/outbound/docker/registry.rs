//! Registry manifest lookups over the distribution HTTP API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::domain::ImageRef;
use crate::error::{Error, Result};
use crate::port::outbound::ImageRegistry;

const DRIVER: &str = "registry";
const DIGEST_HEADER: &str = "docker-content-digest";
const MANIFEST_TYPES: &str = "application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.oci.image.manifest.v1+json";

/// Anonymous client for public registries.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    timeout: Duration,
}

impl HttpRegistry {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    async fn head_manifest(&self, url: &Url, token: Option<&str>) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .head(url.clone())
            .header(ACCEPT, MANIFEST_TYPES)
            .timeout(self.timeout);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    async fn fetch_token(&self, challenge: &Challenge) -> Result<String> {
        let mut url = Url::parse(&challenge.realm)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(service) = &challenge.service {
                query.append_pair("service", service);
            }
            if let Some(scope) = &challenge.scope {
                query.append_pair("scope", scope);
            }
        }

        let response = self.client.get(url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(Error::driver(
                DRIVER,
                format!("token endpoint returned HTTP {}", response.status().as_u16()),
            ));
        }
        let body: TokenResponse = response.json().await?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| Error::driver(DRIVER, "token endpoint returned no token"))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// A parsed `WWW-Authenticate: Bearer …` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

/// Parse a bearer challenge header; other schemes yield `None`.
#[must_use]
pub fn parse_challenge(header: &str) -> Option<Challenge> {
    let params = header.trim().strip_prefix("Bearer ")?;
    let mut fields = HashMap::new();
    let mut rest = params.trim();

    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=')?;
        let after_key = after_key.trim_start();
        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            let end = after_key.find(',').unwrap_or(after_key.len());
            (&after_key[..end], &after_key[end..])
        };
        fields.insert(key.trim().to_ascii_lowercase(), value.to_string());
        rest = remainder.trim_start_matches([',', ' ']);
    }

    Some(Challenge {
        realm: fields.remove("realm")?,
        service: fields.remove("service"),
        scope: fields.remove("scope"),
    })
}

/// Manifest URL for `image`'s tag.
pub fn manifest_url(image: &ImageRef) -> Result<Url> {
    Ok(Url::parse(&format!(
        "https://{}/v2/{}/manifests/{}",
        image.registry, image.repository, image.tag
    ))?)
}

fn digest_of(response: &reqwest::Response) -> Result<String> {
    response
        .headers()
        .get(DIGEST_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .ok_or_else(|| Error::driver(DRIVER, "manifest response carried no digest"))
}

#[async_trait]
impl ImageRegistry for HttpRegistry {
    async fn remote_digest(&self, image: &ImageRef) -> Result<String> {
        let url = manifest_url(image)?;
        let response = self.head_manifest(&url, None).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_challenge)
                .ok_or_else(|| Error::driver(DRIVER, "unsupported auth challenge"))?;
            debug!(realm = %challenge.realm, "Fetching registry token");
            let token = self.fetch_token(&challenge).await?;
            self.head_manifest(&url, Some(&token)).await?
        } else {
            response
        };

        if !response.status().is_success() {
            return Err(Error::driver(
                DRIVER,
                format!("manifest lookup returned HTTP {}", response.status().as_u16()),
            ));
        }
        digest_of(&response)
    }
}
