use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GmailError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Local port the OAuth redirect listener binds to
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
            redirect_port: default_redirect_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Messages per cached chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Message ids requested per list call
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_workers: default_max_workers(),
            chunk_size: default_chunk_size(),
            page_size: default_page_size(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.backoff_base_secs),
            self.backoff_multiplier,
        )
    }
}

/// How often progress lines are logged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_list_every")]
    pub list_every: usize,
    #[serde(default = "default_sequential_every")]
    pub sequential_every: usize,
    #[serde(default = "default_parallel_every")]
    pub parallel_every: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            list_every: default_list_every(),
            sequential_every: default_sequential_every(),
            parallel_every: default_parallel_every(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from(".gmail-top-senders/token.json")
}

fn default_redirect_port() -> u16 {
    8080
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".gmail-top-senders/cache")
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_workers() -> usize {
    6
}

fn default_chunk_size() -> usize {
    10_000
}

fn default_page_size() -> u32 {
    500
}

fn default_list_every() -> usize {
    2500
}

fn default_sequential_every() -> usize {
    1000
}

fn default_parallel_every() -> usize {
    100
}

fn default_top_n() -> usize {
    20
}

impl Config {
    /// Parse the config file without validating it
    ///
    /// Callers apply command-line overrides first and then call
    /// [`Config::validate`].
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.auth.redirect_port == 0 {
            return Err(GmailError::ConfigError(
                "auth.redirect_port must be a fixed, non-zero port".to_string(),
            ));
        }

        if self.fetch.max_retries == 0 {
            return Err(GmailError::ConfigError(
                "fetch.max_retries must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_retries > 10 {
            return Err(GmailError::ConfigError(
                "fetch.max_retries cannot exceed 10".to_string(),
            ));
        }

        if self.fetch.backoff_multiplier < 1.0 {
            return Err(GmailError::ConfigError(
                "fetch.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }

        // Gmail allows 250 quota units/sec; messages.get costs 5
        if self.fetch.max_workers == 0 {
            return Err(GmailError::ConfigError(
                "fetch.max_workers must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_workers > 50 {
            return Err(GmailError::ConfigError(
                "fetch.max_workers cannot exceed 50 (to stay under Gmail API rate limits of 250 units/sec)".to_string(),
            ));
        }

        if self.fetch.chunk_size == 0 {
            return Err(GmailError::ConfigError(
                "fetch.chunk_size must be at least 1".to_string(),
            ));
        }

        if self.fetch.page_size == 0 || self.fetch.page_size > 500 {
            return Err(GmailError::ConfigError(
                "fetch.page_size must be between 1 and 500".to_string(),
            ));
        }

        if self.progress.list_every == 0
            || self.progress.sequential_every == 0
            || self.progress.parallel_every == 0
        {
            return Err(GmailError::ConfigError(
                "progress intervals must be greater than 0".to_string(),
            ));
        }

        if self.report.top_n == 0 {
            return Err(GmailError::ConfigError(
                "report.top_n must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.auth.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.auth.redirect_port, 8080);
        assert_eq!(config.fetch.max_retries, 5);
        assert_eq!(config.fetch.backoff_base_secs, 1);
        assert_eq!(config.fetch.backoff_multiplier, 2.0);
        assert_eq!(config.fetch.max_workers, 6);
        assert_eq!(config.fetch.chunk_size, 10_000);
        assert_eq!(config.progress.list_every, 2500);
        assert_eq!(config.progress.sequential_every, 1000);
        assert_eq!(config.progress.parallel_every, 100);
        assert_eq!(config.report.top_n, 20);
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_retries_zero() {
        let mut config = Config::default();
        config.fetch.max_retries = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_retries"));
    }

    #[test]
    fn test_config_validation_max_workers_bounds() {
        let mut config = Config::default();
        config.fetch.max_workers = 0;
        assert!(config.validate().is_err());

        config.fetch.max_workers = 51;
        assert!(config.validate().is_err());

        config.fetch.max_workers = 1;
        assert!(config.validate().is_ok());
        config.fetch.max_workers = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_chunk_size_zero() {
        let mut config = Config::default();
        config.fetch.chunk_size = 0;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("chunk_size"));
    }

    #[test]
    fn test_config_validation_page_size() {
        let mut config = Config::default();
        config.fetch.page_size = 501;
        assert!(config.validate().is_err());
        config.fetch.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_multiplier_below_one() {
        let mut config = Config::default();
        config.fetch.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_progress_zero() {
        let mut config = Config::default();
        config.progress.parallel_every = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_port_and_top_n() {
        let mut config = Config::default();
        config.auth.redirect_port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.report.top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_from_fetch_config() {
        let policy = FetchConfig::default().retry_policy();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
    }

    #[tokio::test]
    async fn test_config_load_save_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = Config::default();
        config.fetch.max_workers = 12;
        config.report.top_n = 5;
        config.cache.dir = PathBuf::from("/tmp/senders");

        config.save(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();

        assert_eq!(loaded.fetch.max_workers, 12);
        assert_eq!(loaded.report.top_n, 5);
        assert_eq!(loaded.cache.dir, PathBuf::from("/tmp/senders"));
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/nonexistent/path/config.toml");
        let config = Config::load(path).await.unwrap();
        assert_eq!(config.fetch.chunk_size, 10_000);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "invalid toml [[[")
            .await
            .unwrap();

        let result = Config::load(temp_file.path()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_config_partial_with_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let partial = r#"
[fetch]
chunk_size = 500

[report]
top_n = 3
"#;
        tokio::fs::write(temp_file.path(), partial).await.unwrap();

        let config = Config::load(temp_file.path()).await.unwrap();
        assert_eq!(config.fetch.chunk_size, 500);
        assert_eq!(config.fetch.max_workers, 6);
        assert_eq!(config.report.top_n, 3);
        assert_eq!(config.auth.redirect_port, 8080);
    }

    #[tokio::test]
    async fn test_config_load_does_not_validate() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "[fetch]\nchunk_size = 0\n")
            .await
            .unwrap();

        let config = Config::load(temp_file.path()).await.unwrap();
        assert_eq!(config.fetch.chunk_size, 0);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_config_create_example() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        Config::create_example(&path).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("[fetch]"));
        assert!(content.contains("chunk_size = 10000"));
    }
}
