//! Release feed backed by the GitHub releases API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::port::outbound::ReleaseFeed;

const DRIVER: &str = "release-feed";

#[derive(Debug, Clone)]
pub struct GithubReleases {
    client: Client,
    url: String,
    timeout: Duration,
}

impl GithubReleases {
    /// `url` points at a `releases/latest` endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct Release {
    tag_name: String,
}

#[async_trait]
impl ReleaseFeed for GithubReleases {
    async fn latest_version(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .header(USER_AGENT, concat!("stackwarden/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/vnd.github+json")
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::driver(
                DRIVER,
                format!("HTTP {}", response.status().as_u16()),
            ));
        }

        let release: Release = response.json().await?;
        let tag = release.tag_name.trim();
        if tag.is_empty() {
            return Err(Error::driver(DRIVER, "release has an empty tag"));
        }
        Ok(tag.to_string())
    }
}
