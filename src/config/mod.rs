use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "ops-toolkit.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extractor: ExtractorConfig,
    pub auditor: AuditorConfig,
    pub consolidator: ConsolidatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub input_dir: PathBuf,
    pub output_csv: PathBuf,
    pub log_file: PathBuf,
    /// Top-level key holding the list of user objects.
    pub users_key: String,
    /// Tag whose value lands in the last CSV column.
    pub tag_key: String,
    pub extensions: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("exports"),
            output_csv: PathBuf::from("users.csv"),
            log_file: PathBuf::from("user_extract.log"),
            users_key: "Users".to_string(),
            tag_key: "Department".to_string(),
            extensions: vec!["json".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorConfig {
    pub region: Option<String>,
    pub output_dir: PathBuf,
    pub page_size: u32,
    /// Replaces `https://<service>.<region>.amazonaws.com` for every call.
    pub endpoint_override: Option<String>,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            region: None,
            output_dir: PathBuf::from("audit"),
            page_size: 50,
            endpoint_override: None,
        }
    }
}

impl AuditorConfig {
    pub fn resolved_region(&self) -> String {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "us-east-1".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidatorConfig {
    pub root: PathBuf,
    pub output_file: PathBuf,
    pub max_file_size: u64,
    pub sniff_bytes: usize,
}

impl Default for ConsolidatorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_file: PathBuf::from("repository_dump.txt"),
            max_file_size: 1024 * 1024,
            sniff_bytes: 1024,
        }
    }
}

impl Config {
    /// Reads `path` when it exists, otherwise falls back to the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.extractor.users_key, "Users");
        assert_eq!(config.consolidator.max_file_size, 1_048_576);
        assert_eq!(config.auditor.page_size, 50);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ops.toml");
        std::fs::write(
            &path,
            "[extractor]\ntag_key = \"CostCenter\"\n\n[auditor]\nregion = \"eu-west-1\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.extractor.tag_key, "CostCenter");
        assert_eq!(config.extractor.output_csv, PathBuf::from("users.csv"));
        assert_eq!(config.auditor.resolved_region(), "eu-west-1");
        assert_eq!(config.consolidator.sniff_bytes, 1024);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ops.toml");
        let mut config = Config::default();
        config.consolidator.max_file_size = 4096;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.consolidator.max_file_size, 4096);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ops.toml");
        std::fs::write(&path, "[extractor\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
