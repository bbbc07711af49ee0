//! HTTP implementation of [`MetadataApi`] on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::{ApiError, ArtistDto, MetadataApi, TagDto};

/// Client for the remote metadata listing endpoints.
#[derive(Clone)]
pub struct HttpMetadataApi {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl HttpMetadataApi {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the remote site (e.g., "https://yande.re")
    /// * `page_size` - Records per listing page
    /// * `timeout_secs` - Request timeout in seconds
    pub fn new(base_url: String, page_size: u32, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch `url`, check the status, and decode the JSON body.
    ///
    /// The body is read as text and decoded with serde_json separately
    /// so transport failures and malformed payloads stay
    /// distinguishable in the sync failure taxonomy.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MetadataApi for HttpMetadataApi {
    async fn tag_page(&self, page: u32) -> Result<Vec<TagDto>, ApiError> {
        let url = format!("{}/tag.json", self.base_url);
        self.get_json(
            &url,
            &[
                ("order", "date".to_string()),
                ("limit", self.page_size.to_string()),
                ("page", page.to_string()),
            ],
        )
        .await
    }

    async fn tag_by_name(&self, name: &str) -> Result<Vec<TagDto>, ApiError> {
        let url = format!("{}/tag.json", self.base_url);
        self.get_json(&url, &[("name", name.to_string())]).await
    }

    async fn artist_page(&self, page: u32) -> Result<Vec<ArtistDto>, ApiError> {
        let url = format!("{}/artist.json", self.base_url);
        self.get_json(
            &url,
            &[
                ("order", "date".to_string()),
                ("limit", self.page_size.to_string()),
                ("page", page.to_string()),
            ],
        )
        .await
    }
}
