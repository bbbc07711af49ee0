//! Common test infrastructure
//!
//! Scripted remote API plus an engine fixture over a real on-disk
//! store, so tests exercise the same persistence path as the host app.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kagami_metadata_engine::api::{ApiError, ArtistDto, MetadataApi, TagDto};
use kagami_metadata_engine::config::{ApiFileConfig, CliConfig, EngineConfig, FileConfig};
use kagami_metadata_engine::tags::TagCategory;
use kagami_metadata_engine::{FileBlobStore, MetadataEngine};

pub fn tag(id: u64, name: &str, category: TagCategory) -> TagDto {
    TagDto {
        id,
        name: name.to_string(),
        category,
        count: 0,
        ambiguous: false,
    }
}

pub fn primary_artist(id: u64, name: &str, urls: &[&str]) -> ArtistDto {
    ArtistDto {
        id,
        name: name.to_string(),
        alias_of: None,
        urls: urls.iter().map(|u| u.to_string()).collect(),
    }
}

pub fn artist_alias(id: u64, parent: u64, name: &str) -> ArtistDto {
    ArtistDto {
        id,
        name: name.to_string(),
        alias_of: Some(parent),
        urls: vec![],
    }
}

/// Scripted remote API. Pages beyond the script are empty; once a
/// failure page is set, that page and all later ones fail.
#[derive(Default)]
pub struct ScriptedApi {
    tag_pages: Mutex<Vec<Vec<TagDto>>>,
    artist_pages: Mutex<Vec<Vec<ArtistDto>>>,
    fail_tag_pages_from: Mutex<Option<u32>>,
    lookups: Mutex<HashMap<String, TagCategory>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_tag_pages(&self, pages: Vec<Vec<TagDto>>) {
        *self.tag_pages.lock().unwrap() = pages;
    }

    pub fn set_artist_pages(&self, pages: Vec<Vec<ArtistDto>>) {
        *self.artist_pages.lock().unwrap() = pages;
    }

    pub fn fail_tag_pages_from(&self, page: u32) {
        *self.fail_tag_pages_from.lock().unwrap() = Some(page);
    }

    pub fn clear_failures(&self) {
        *self.fail_tag_pages_from.lock().unwrap() = None;
    }

    pub fn set_lookup(&self, name: &str, category: TagCategory) {
        self.lookups
            .lock()
            .unwrap()
            .insert(name.to_string(), category);
    }
}

#[async_trait]
impl MetadataApi for ScriptedApi {
    async fn tag_page(&self, page: u32) -> Result<Vec<TagDto>, ApiError> {
        if let Some(from) = *self.fail_tag_pages_from.lock().unwrap() {
            if page >= from {
                return Err(ApiError::Status(503));
            }
        }
        Ok(self
            .tag_pages
            .lock()
            .unwrap()
            .get((page - 1) as usize)
            .cloned()
            .unwrap_or_default())
    }

    async fn tag_by_name(&self, name: &str) -> Result<Vec<TagDto>, ApiError> {
        Ok(self
            .lookups
            .lock()
            .unwrap()
            .get(name)
            .map(|category| vec![tag(1, name, *category)])
            .unwrap_or_default())
    }

    async fn artist_page(&self, page: u32) -> Result<Vec<ArtistDto>, ApiError> {
        Ok(self
            .artist_pages
            .lock()
            .unwrap()
            .get((page - 1) as usize)
            .cloned()
            .unwrap_or_default())
    }
}

/// Build an engine over `data_dir` with inter-page delays disabled.
pub fn engine_over(
    data_dir: &Path,
    seed_dir: Option<&Path>,
    api: Arc<ScriptedApi>,
) -> MetadataEngine {
    let cli = CliConfig {
        data_dir: Some(data_dir.to_path_buf()),
        seed_dir: seed_dir.map(Path::to_path_buf),
        base_url: None,
    };
    let file = FileConfig {
        api: Some(ApiFileConfig {
            page_delay_ms: Some(0),
            ..Default::default()
        }),
        ..Default::default()
    };
    let config = EngineConfig::resolve(&cli, Some(file)).unwrap();
    let store = Arc::new(FileBlobStore::new(&config.data_dir).unwrap());
    MetadataEngine::new(&config, store, api)
}
