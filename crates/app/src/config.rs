use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub rules: RulesConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize)]
pub struct RulesConfig {
    /// CSV file with header
    /// `category_name,display_name,requires_positive_amount,keywords`.
    pub categories_file: PathBuf,
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: u64,
}

/// Inputs per source format. An absent entry means that adapter is not
/// registered.
#[derive(Debug, Default, Deserialize)]
pub struct SourcesConfig {
    pub csv_file: Option<PathBuf>,
    pub flat_file: Option<PathBuf>,
    pub xml_file: Option<PathBuf>,
    pub json_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_cache_ttl_minutes() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config file {}", path.display()))
}
