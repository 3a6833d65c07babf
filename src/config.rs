//! Configuration management for treestats
//!
//! Configuration is layered: defaults, then an optional TOML/YAML/JSON file,
//! then a named profile, then `TREESTATS_*` environment variables. Command
//! line flags are applied last by the binary.

use crate::error::{Result, TreeStatsError};
use crate::logging::{LogLevel, LoggingConfig};
use crate::tree_bits::DegeneratePolicy;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use validator::Validate;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TreeStatsConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// How the tree is scored
    #[validate(nested)]
    pub scoring: ScoringSettings,

    /// How the report is rendered
    #[validate(nested)]
    pub output: OutputSettings,
}

/// Scoring settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScoringSettings {
    /// Score sibling subtrees on a rayon pool
    pub parallel: bool,

    /// Worker threads for parallel scoring (0 = rayon default)
    #[validate(range(max = 256))]
    pub num_threads: usize,

    /// Handling of zero-sized logarithm arguments
    pub degenerate_policy: DegeneratePolicy,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            parallel: false,
            num_threads: 0,
            degenerate_policy: DegeneratePolicy::Reject,
        }
    }
}

/// Report rendering settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OutputSettings {
    /// Output format; inferred from the file extension when unset
    pub format: Option<OutputFormat>,

    /// Write run metadata alongside the statistic
    pub include_metadata: bool,

    /// Digits after the decimal point in text formats
    #[validate(range(min = 1, max = 17))]
    pub precision: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: None,
            include_metadata: true,
            precision: 6,
        }
    }
}

/// Supported output formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-separated header and row
    Tsv,
    /// JavaScript Object Notation
    Json,
    /// Single XML element
    Xml,
}

impl OutputFormat {
    /// `.json` and `.xml` select their format, anything else is TSV
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => OutputFormat::Json,
            Some("xml") => OutputFormat::Xml,
            _ => OutputFormat::Tsv,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Xml => write!(f, "xml"),
        }
    }
}

/// Named scoring presets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigProfile {
    pub name: String,
    pub description: String,
    pub scoring: ScoringSettings,
}

/// Configuration manager
pub struct ConfigManager {
    config: TreeStatsConfig,
    profiles: BTreeMap<String, ConfigProfile>,
}

impl ConfigManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self::with_config(TreeStatsConfig::default())
    }

    fn with_config(config: TreeStatsConfig) -> Self {
        let mut manager = Self {
            config,
            profiles: BTreeMap::new(),
        };
        manager.load_builtin_profiles();
        manager
    }

    /// Load configuration from a `.toml`, `.yaml`/`.yml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let config: TreeStatsConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| TreeStatsError::config(format!("TOML parse error: {}", e)))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| TreeStatsError::config(format!("YAML parse error: {}", e)))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| TreeStatsError::config(format!("JSON parse error: {}", e)))?,
            _ => {
                return Err(TreeStatsError::config(
                    "Unsupported config file format. Use .toml, .yaml, .yml, or .json",
                ))
            }
        };

        validate(&config, "Configuration validation failed")?;
        Ok(Self::with_config(config))
    }

    /// Apply `TREESTATS_*` overrides from the process environment
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_env_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("TREESTATS_LOG_LEVEL") {
            self.config.logging.level = level.parse::<LogLevel>()?;
        }

        if let Some(json_logs) = lookup("TREESTATS_JSON_LOGS") {
            self.config.logging.json_format = json_logs
                .parse()
                .map_err(|e| TreeStatsError::config(format!("Invalid TREESTATS_JSON_LOGS: {}", e)))?;
        }

        if let Some(parallel) = lookup("TREESTATS_PARALLEL") {
            self.config.scoring.parallel = parallel
                .parse()
                .map_err(|e| TreeStatsError::config(format!("Invalid TREESTATS_PARALLEL: {}", e)))?;
        }

        if let Some(threads) = lookup("TREESTATS_THREADS") {
            self.config.scoring.num_threads = threads
                .parse()
                .map_err(|e| TreeStatsError::config(format!("Invalid TREESTATS_THREADS: {}", e)))?;
        }

        if let Some(policy) = lookup("TREESTATS_DEGENERATE_POLICY") {
            self.config.scoring.degenerate_policy = DegeneratePolicy::from_str(&policy, true)
                .map_err(|e| {
                    TreeStatsError::config(format!("Invalid TREESTATS_DEGENERATE_POLICY: {}", e))
                })?;
        }

        validate(
            &self.config,
            "Configuration validation failed after env override",
        )
    }

    /// Replace the scoring settings with a named profile's
    pub fn apply_profile(&mut self, profile_name: &str) -> Result<()> {
        let profile = self
            .profiles
            .get(profile_name)
            .ok_or_else(|| TreeStatsError::config(format!("Unknown profile: {}", profile_name)))?;

        self.config.scoring = profile.scoring.clone();
        validate(&self.config, "Profile validation failed")
    }

    pub fn config(&self) -> &TreeStatsConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TreeStatsConfig {
        &mut self.config
    }

    pub fn into_config(self) -> TreeStatsConfig {
        self.config
    }

    pub fn list_profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(|s| s.as_str()).collect()
    }

    pub fn profile_description(&self, name: &str) -> Option<&str> {
        self.profiles.get(name).map(|p| p.description.as_str())
    }

    /// Save current configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(&self.config)
                .map_err(|e| TreeStatsError::config(format!("TOML serialize error: {}", e)))?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(&self.config)
                .map_err(|e| TreeStatsError::config(format!("YAML serialize error: {}", e)))?,
            Some("json") => serde_json::to_string_pretty(&self.config)?,
            _ => {
                return Err(TreeStatsError::config(
                    "Unsupported config file format. Use .toml, .yaml, .yml, or .json",
                ))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    fn load_builtin_profiles(&mut self) {
        let parallel_profile = ConfigProfile {
            name: "parallel".to_string(),
            description: "Score sibling subtrees concurrently on all cores".to_string(),
            scoring: ScoringSettings {
                parallel: true,
                ..Default::default()
            },
        };

        let lenient_profile = ConfigProfile {
            name: "lenient".to_string(),
            description: "Carry zero-length logarithms through as NaN instead of failing"
                .to_string(),
            scoring: ScoringSettings {
                degenerate_policy: DegeneratePolicy::Propagate,
                ..Default::default()
            },
        };

        self.profiles.insert(parallel_profile.name.clone(), parallel_profile);
        self.profiles.insert(lenient_profile.name.clone(), lenient_profile);
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &TreeStatsConfig, context: &str) -> Result<()> {
    config
        .validate()
        .map_err(|e| TreeStatsError::config(format!("{}: {}", context, e)))
}
