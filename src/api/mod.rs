//! Client for the remote metadata API.
//!
//! The remote side is a paginated booru-style listing: tags and artists
//! are returned newest-first by id, 2000 records per page by default.
//! Only this module talks to the network; the caches and syncers go
//! through the [`MetadataApi`] trait so tests can substitute a scripted
//! implementation.

mod client;
mod models;

pub use client::HttpMetadataApi;
pub use models::{ArtistDto, TagDto};

use async_trait::async_trait;

/// Errors from the remote metadata API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Remote metadata listing and lookup operations.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    /// Fetch one page of the tag listing, newest-first by id. Pages are
    /// 1-based; an empty page means the listing is exhausted.
    async fn tag_page(&self, page: u32) -> Result<Vec<TagDto>, ApiError>;

    /// Look up tags matching `name`. The upstream endpoint is a prefix
    /// search, so the result may contain more than one candidate (or
    /// none); callers filter for the exact name.
    async fn tag_by_name(&self, name: &str) -> Result<Vec<TagDto>, ApiError>;

    /// Fetch one page of the artist listing, newest-first by id.
    async fn artist_page(&self, page: u32) -> Result<Vec<ArtistDto>, ApiError>;
}
