mod file_config;

pub use file_config::{ApiFileConfig, FileConfig, TagsFileConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::tags::TagCacheConfig;

const DEFAULT_BASE_URL: &str = "https://yande.re";
const DEFAULT_PAGE_SIZE: u32 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_DELAY_MS: u64 = 120;
const DEFAULT_WRITE_DEBOUNCE_MS: u64 = 800;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub seed_dir: Option<PathBuf>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for the engine's persisted blobs.
    pub data_dir: PathBuf,
    /// Directory with bundled seed snapshots, read on first run only.
    pub seed_dir: Option<PathBuf>,

    pub api: ApiSettings,
    pub tags: TagSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    pub page_delay_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TagSettings {
    pub write_debounce_ms: u64,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            write_debounce_ms: DEFAULT_WRITE_DEBOUNCE_MS,
        }
    }
}

impl EngineConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let seed_dir = file
            .seed_dir
            .map(PathBuf::from)
            .or_else(|| cli.seed_dir.clone());

        let api_file = file.api.unwrap_or_default();
        let api = ApiSettings {
            base_url: api_file
                .base_url
                .or_else(|| cli.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            page_size: api_file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            timeout_secs: api_file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            page_delay_ms: api_file.page_delay_ms.unwrap_or(DEFAULT_PAGE_DELAY_MS),
        };
        if api.page_size == 0 {
            bail!("api.page_size must be greater than zero");
        }

        let tags_file = file.tags.unwrap_or_default();
        let tags = TagSettings {
            write_debounce_ms: tags_file
                .write_debounce_ms
                .unwrap_or(DEFAULT_WRITE_DEBOUNCE_MS),
        };

        Ok(Self {
            data_dir,
            seed_dir,
            api,
            tags,
        })
    }

    pub fn tag_cache(&self) -> TagCacheConfig {
        TagCacheConfig {
            write_debounce: Duration::from_millis(self.tags.write_debounce_ms),
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.api.page_delay_ms)
    }
}
