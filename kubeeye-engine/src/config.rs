//! Configuration management for kubeeye
//!
//! Settings are layered:
//! 1. Environment variables (highest priority)
//! 2. Configuration file (TOML format)
//! 3. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::LoggingConfig;
use crate::ownership::DEFAULT_MAX_OWNER_DEPTH;

/// Main configuration struct for kubeeye
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeEyeConfig {
    /// How to reach the cluster
    pub cluster: ClusterSettings,
    /// Analyzer tuning
    pub analysis: AnalysisSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Cluster connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Explicit kubeconfig path; falls back to KUBECONFIG / ~/.kube/config
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of current-context
    pub context: Option<String>,
    /// Use the service account mounted into the pod
    pub in_cluster: bool,
}

/// Analyzer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Objects checked concurrently within one analyzer call
    pub concurrency: usize,
    /// Maximum owner hops before giving up
    pub max_owner_depth: usize,
    /// Deadline for one CLI invocation, in seconds (0 disables)
    pub timeout_secs: u64,
    /// Field manager used for server-side apply
    pub field_manager: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_owner_depth: DEFAULT_MAX_OWNER_DEPTH,
            timeout_secs: 60,
            field_manager: "kubeeye".to_string(),
        }
    }
}

impl KubeEyeConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(config_path) = Self::find_config_file() {
            match Self::load_from_file(&config_path) {
                Ok(file_config) => config = file_config,
                Err(e) => tracing::warn!("ignoring config file: {}", e),
            }
        }

        config.apply_env_overrides();

        config
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("KUBEEYE_CONFIG") {
            return Some(PathBuf::from(path));
        }

        [
            PathBuf::from("./kubeeye.toml"),
            PathBuf::from("/etc/kubeeye/config.toml"),
        ]
        .into_iter()
        .find(|p| p.exists())
    }

    /// Apply `KUBEEYE_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Cluster
        if let Some(path) = lookup("KUBEEYE_KUBECONFIG") {
            self.cluster.kubeconfig = Some(PathBuf::from(path));
        }
        if let Some(context) = lookup("KUBEEYE_CONTEXT") {
            self.cluster.context = Some(context);
        }
        if let Some(in_cluster) = lookup("KUBEEYE_IN_CLUSTER") {
            self.cluster.in_cluster = in_cluster.parse().unwrap_or(false);
        }

        // Analysis
        if let Some(value) = lookup("KUBEEYE_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.analysis.concurrency = value;
        }
        if let Some(value) = lookup("KUBEEYE_MAX_OWNER_DEPTH").and_then(|v| v.parse().ok()) {
            self.analysis.max_owner_depth = value;
        }
        if let Some(value) = lookup("KUBEEYE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.analysis.timeout_secs = value;
        }
        if let Some(manager) = lookup("KUBEEYE_FIELD_MANAGER") {
            self.analysis.field_manager = manager;
        }

        // Logging
        if let Some(level) = lookup("KUBEEYE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("KUBEEYE_LOG_JSON") {
            self.logging.json_format = json.parse().unwrap_or(false);
        }
        if let Some(dir) = lookup("KUBEEYE_LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("# failed to render sample: {}", e))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.concurrency == 0 {
            return Err(ConfigError::Validation(
                "analysis.concurrency must be at least 1".to_string(),
            ));
        }
        if self.analysis.max_owner_depth == 0 {
            return Err(ConfigError::Validation(
                "analysis.max_owner_depth must be at least 1".to_string(),
            ));
        }
        if self.analysis.field_manager.trim().is_empty() {
            return Err(ConfigError::Validation(
                "analysis.field_manager must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    FileRead(PathBuf, String),
    /// Failed to parse configuration
    Parse(String),
    /// Configuration validation failed
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, err) => {
                write!(f, "Failed to read config file {:?}: {}", path, err)
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse config: {}", err),
            ConfigError::Validation(err) => write!(f, "Config validation failed: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}
