// src/services/fetcher.rs

//! Target fetching.
//!
//! Retrieves the raw body of a target URL. Transport failures are
//! normalized into [`FetchError`]; nothing is retried here.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::FetchConfig;
use crate::utils::http;

/// Source of target content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the raw body at `url`.
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: Client,
    fingerprint_error_pages: bool,
}

impl HttpFetcher {
    /// Build a fetcher with the configured user agent and timeout.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = http::create_async_client(config)?;
        Ok(Self::with_client(client, config.fingerprint_error_pages))
    }

    pub fn with_client(client: Client, fingerprint_error_pages: bool) -> Self {
        Self {
            client,
            fingerprint_error_pages,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            if !self.fingerprint_error_pages {
                return Err(FetchError::HttpError(status.as_u16()));
            }
            log::warn!("{url} answered {status}, fingerprinting the response body anyway");
        }

        let body = response.bytes().await?;
        log::debug!("Fetched {} bytes from {url}", body.len());
        Ok(body.to_vec())
    }
}
