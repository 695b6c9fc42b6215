use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::datasets::{DEFAULT_DATASETS_SERVER_URL, DEFAULT_DATASET_ID};
use crate::error::Result;

pub const ENV_PREFIX: &str = "CRUMB_EVAL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvalConfig {
    pub dataset_id: String,
    pub datasets_server_url: String,
    pub page_size: usize,
    pub request_timeout_secs: u64,
    /// Where downloaded splits are kept. Defaults to the platform cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub disable_cache: bool,
    /// Read splits from this directory instead of the datasets server.
    #[serde(default)]
    pub dataset_dir: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            dataset_id: DEFAULT_DATASET_ID.to_string(),
            datasets_server_url: DEFAULT_DATASETS_SERVER_URL.to_string(),
            page_size: 100,
            request_timeout_secs: 60,
            cache_dir: None,
            disable_cache: false,
            dataset_dir: None,
        }
    }
}

impl EvalConfig {
    /// Layers defaults, the optional config file and `CRUMB_EVAL_*` variables,
    /// later sources overriding earlier ones.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("dataset_id", defaults.dataset_id)?
            .set_default("datasets_server_url", defaults.datasets_server_url)?
            .set_default("page_size", defaults.page_size as u64)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("disable_cache", defaults.disable_cache)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if self.disable_cache {
            return None;
        }

        self.cache_dir.clone().or_else(|| {
            ProjectDirs::from("", "", "crumb-eval").map(|dirs| dirs.cache_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("crumb-eval.toml");
        fs::write(
            &path,
            r#"
dataset_id = "someone/crumb-mirror"
page_size = 25
cache_dir = "/tmp/crumb-cache"
"#,
        )
        .unwrap();

        let config = EvalConfig::load(Some(&path)).unwrap();
        assert_eq!(config.dataset_id, "someone/crumb-mirror");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.datasets_server_url, DEFAULT_DATASETS_SERVER_URL);
        assert_eq!(
            config.resolved_cache_dir(),
            Some(PathBuf::from("/tmp/crumb-cache"))
        );
        assert!(config.dataset_dir.is_none());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = EvalConfig::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_disable_cache() {
        let config = EvalConfig {
            cache_dir: Some(PathBuf::from("/tmp/crumb-cache")),
            disable_cache: true,
            ..EvalConfig::default()
        };
        assert!(config.resolved_cache_dir().is_none());
    }
}
