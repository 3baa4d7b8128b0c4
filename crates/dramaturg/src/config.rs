//! Application configuration (YAML)
//!
//! Every section is optional; a missing file means defaults throughout.
//!
//! ```yaml
//! compliance:
//!   threshold: 0.7
//!   principles: [...]
//! generation:
//!   timeout_ms: 30000
//!   model: default
//! cache:
//!   capacity: 256
//!   ttl_seconds: 3600
//! report:
//!   format: markdown
//! ```

use dramaturg_compliance::{ConfigError, PrincipleSet};
use dramaturg_core::{ModelParams, PipelineError};
use dramaturg_stations::ReportFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Names the configuration file when no path is given explicitly
pub const CONFIG_ENV: &str = "DRAMATURG_CONFIG";

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("CONFIG/cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CONFIG/malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("CONFIG/{0}")]
    Invalid(String),

    #[error(transparent)]
    Compliance(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Bound on every generation call
    pub timeout_ms: u64,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let params = ModelParams::default();
        Self {
            timeout_ms: 30_000,
            model: params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn params(&self) -> ModelParams {
        ModelParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Zero disables the generation cache
    pub capacity: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_seconds: 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub compliance: PrincipleSet,
    pub generation: GenerationConfig,
    pub cache: CacheConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, SetupError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SetupError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `explicit`, else from `$DRAMATURG_CONFIG`, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self, SetupError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match config_path(explicit, from_env) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        self.compliance.validate()?;
        if self.generation.timeout_ms == 0 {
            return Err(SetupError::Invalid("generation.timeout_ms must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(SetupError::Invalid(format!(
                "generation.temperature {} is outside [0, 2]",
                self.generation.temperature
            )));
        }
        Ok(())
    }
}

fn config_path(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| from_env.filter(|p| !p.as_os_str().is_empty()))
}
