use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::PrepError;
use crate::split::SplitThresholds;

pub const DEFAULT_CONFIG_FILE: &str = "slideprep.json";
pub const GDC_FILES_ENDPOINT: &str = "https://api.gdc.cancer.gov/files";
pub const DEFAULT_DATA_TYPE: &str = "Slide Image";
pub const DEFAULT_FIELDS: &str = "file_id,file_name,data_type,submitter_id";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONTAINER_PATTERN: &str = "*.h5";
pub const DEFAULT_DOWNLOAD_CLIENT: &str = "gdc-client";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub split: SplitSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub manifest: ManifestSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SplitSection {
    #[serde(default)]
    pub train_thresh: Option<f64>,
    #[serde(default)]
    pub test_thresh: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CatalogSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub request_delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub retry_exhausted: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DownloadSection {
    #[serde(default)]
    pub client: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ManifestSection {
    #[serde(default)]
    pub include_unresolved: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub thresholds: SplitThresholds,
    /// File name pattern applied inside each modality directory.
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub data_type: String,
    pub fields: String,
    pub page_size: usize,
    /// Minimum pause after each catalog query.
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: usize,
    /// Re-query slides cached as "not found" instead of treating them as final.
    pub retry_exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub client: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ManifestConfig {
    /// Emit blank rows for slides that never resolved.
    pub include_unresolved: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub split: SplitConfig,
    pub catalog: CatalogConfig,
    pub download: DownloadConfig,
    pub manifest: ManifestConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `slideprep.json` in the working directory when no path
    /// is given. A missing default file yields the built-in defaults; a
    /// missing explicit file is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, PrepError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PrepError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PrepError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, PrepError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let defaults = SplitThresholds::default();

        let split = SplitConfig {
            thresholds: SplitThresholds {
                train: config.split.train_thresh.unwrap_or(defaults.train),
                test: config.split.test_thresh.unwrap_or(defaults.test),
            },
            pattern: config
                .split
                .pattern
                .unwrap_or_else(|| DEFAULT_CONTAINER_PATTERN.to_string()),
        };

        let page_size = config.catalog.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(PrepError::ConfigParse(
                "catalog.page_size must be positive".to_string(),
            ));
        }
        let catalog = CatalogConfig {
            base_url: config
                .catalog
                .base_url
                .unwrap_or_else(|| GDC_FILES_ENDPOINT.to_string()),
            data_type: config
                .catalog
                .data_type
                .unwrap_or_else(|| DEFAULT_DATA_TYPE.to_string()),
            fields: config
                .catalog
                .fields
                .unwrap_or_else(|| DEFAULT_FIELDS.to_string()),
            page_size,
            request_delay: Duration::from_millis(
                config
                    .catalog
                    .request_delay_ms
                    .unwrap_or(DEFAULT_REQUEST_DELAY_MS),
            ),
            timeout: Duration::from_secs(
                config.catalog.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            max_retries: config.catalog.max_retries.unwrap_or(0),
            retry_exhausted: config.catalog.retry_exhausted.unwrap_or(false),
        };

        let download = DownloadConfig {
            client: Utf8PathBuf::from(
                config
                    .download
                    .client
                    .unwrap_or_else(|| DEFAULT_DOWNLOAD_CLIENT.to_string()),
            ),
        };

        let manifest = ManifestConfig {
            include_unresolved: config.manifest.include_unresolved.unwrap_or(true),
        };

        Ok(ResolvedConfig {
            schema_version,
            split,
            catalog,
            download,
            manifest,
        })
    }
}
