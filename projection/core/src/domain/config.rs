// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Projection Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) controlling the
// projection runtime:
// - Temporal reconciler schedule
// - Event bus sizing
// - Default log level

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "ProjectionConfig";

/// Top-level projection configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ProjectionConfig")
    pub kind: String,

    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: ProjectionConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Instance name, used in log lines
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionConfigSpec {
    #[serde(default)]
    pub temporal: TemporalConfig,

    #[serde(default)]
    pub event_bus: EventBusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Temporal reconciler schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalConfig {
    #[serde(default = "default_temporal_enabled")]
    pub enabled: bool,

    /// Seconds between two ticks
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl TemporalConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            enabled: default_temporal_enabled(),
            interval_seconds: default_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before it starts lagging
    #[serde(default = "default_event_bus_capacity")]
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when neither RUST_LOG nor --log-level is given
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata {
                name: "assignments-projection".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ProjectionConfigSpec::default(),
        }
    }
}

impl ProjectionConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. ASSIGNMENTS_CONFIG_PATH environment variable
    /// 2. ./assignments-config.yaml (working directory)
    /// 3. ~/.assignments/config.yaml (user home)
    /// 4. /etc/assignments/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ASSIGNMENTS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./assignments-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".assignments").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/assignments/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::warn!(
                    "No configuration file found in standard locations. Using defaults."
                );
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ASSIGNMENTS_TEMPORAL_ENABLED") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: ASSIGNMENTS_TEMPORAL_ENABLED=true");
                    self.spec.temporal.enabled = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: ASSIGNMENTS_TEMPORAL_ENABLED=false");
                    self.spec.temporal.enabled = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for ASSIGNMENTS_TEMPORAL_ENABLED: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(val) = lookup("ASSIGNMENTS_TICK_INTERVAL_SECONDS") {
            match val.parse::<u64>() {
                Ok(seconds) => {
                    tracing::info!(
                        "Environment override: ASSIGNMENTS_TICK_INTERVAL_SECONDS={}",
                        seconds
                    );
                    self.spec.temporal.interval_seconds = seconds;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for ASSIGNMENTS_TICK_INTERVAL_SECONDS: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("ASSIGNMENTS_EVENT_BUS_CAPACITY") {
            match val.parse::<usize>() {
                Ok(capacity) => {
                    tracing::info!(
                        "Environment override: ASSIGNMENTS_EVENT_BUS_CAPACITY={}",
                        capacity
                    );
                    self.spec.event_bus.capacity = capacity;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for ASSIGNMENTS_EVENT_BUS_CAPACITY: '{}'. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Expected '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Expected '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.temporal.interval_seconds == 0 {
            anyhow::bail!("spec.temporal.interval_seconds must be greater than zero");
        }

        if self.spec.event_bus.capacity == 0 {
            anyhow::bail!("spec.event_bus.capacity must be greater than zero");
        }

        Ok(())
    }
}

fn default_temporal_enabled() -> bool {
    true
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_event_bus_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}
