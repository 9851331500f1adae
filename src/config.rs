use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Top-level engine configuration. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_variables_path")]
    pub variables: PathBuf,
    /// Display selection file. Without one, the display set is empty.
    #[serde(default)]
    pub display: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            variables: default_variables_path(),
            display: None,
        }
    }
}

/// What to do with findings of the sequence/dependency check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Never run the check.
    #[default]
    Off,
    /// Log findings and evaluate anyway.
    Warn,
    /// Refuse to evaluate a store with findings.
    Deny,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub policy: ValidationPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeMode {
    /// One edge per directed department pair, values summed.
    #[default]
    Aggregated,
    /// One edge per flow variable, with lane offsets.
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub mode: EdgeMode,
    /// Distance between neighbouring lanes of parallel edges.
    #[serde(default = "default_parallel_spacing")]
    pub parallel_spacing: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            mode: EdgeMode::default(),
            parallel_spacing: default_parallel_spacing(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_log_filter() }
    }
}

fn default_variables_path() -> PathBuf { PathBuf::from("variables.json") }
fn default_parallel_spacing() -> f64 { 30.0 }
fn default_log_filter() -> String { "warn".to_string() }

impl EngineConfig {
    /// Reads a TOML file. Relative data paths are resolved against the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;

        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.data.resolve_against(base);
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let spacing = self.graph.parallel_spacing;
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "graph.parallel_spacing",
                message: format!("must be a positive number, got {}", spacing),
            });
        }
        Ok(())
    }
}

impl DataConfig {
    fn resolve_against(&mut self, base: &Path) {
        if self.variables.is_relative() {
            self.variables = base.join(&self.variables);
        }
        if let Some(display) = self.display.as_mut().filter(|d| d.is_relative()) {
            *display = base.join(&*display);
        }
    }
}
