//! Configuration management for the show switcher
//!
//! Handles loading and validating the YAML configuration file. Target lists,
//! timer ranges, and MIDI settings are owned by the host configuration layer;
//! the core only reads them at runtime.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default = "default_camera_config")]
    pub camera: SwitcherConfig,
    #[serde(default = "default_overlay_config")]
    pub overlay: SwitcherConfig,
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub statistics: StatsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            companion: CompanionConfig::default(),
            camera: default_camera_config(),
            overlay: default_overlay_config(),
            midi: MidiConfig::default(),
            statistics: StatsConfig::default(),
        }
    }
}

/// Companion HTTP API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompanionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Queue button presses instead of firing them directly
    #[serde(default = "default_true")]
    pub enable_queue: bool,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_queue: true,
        }
    }
}

/// Per-switcher timing and target settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwitcherConfig {
    pub min_seconds: u32,
    pub max_seconds: u32,
    /// Target button locations, each `page/bank/button`
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub sequential_mode: bool,
    #[serde(default = "default_true")]
    pub avoid_repeat: bool,
    /// Number of recent triggers to keep (0 = disabled)
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// MIDI input settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub auto_connect: bool,
    /// Partial port name to connect to (e.g. "MPK", "APC40")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    /// Explicit port index, used when no name filter matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_index: Option<usize>,
    /// Only process messages on this channel (1-16); None = all channels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_connect: true,
            port_name: None,
            port_index: None,
            channel: None,
        }
    }
}

/// Statistics persistence settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_auto_save_minutes")]
    pub auto_save_minutes: u64,
    /// Override for the statistics file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_save_minutes: default_auto_save_minutes(),
            file: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_history_size() -> usize {
    5
}

fn default_auto_save_minutes() -> u64 {
    5
}

fn default_camera_config() -> SwitcherConfig {
    SwitcherConfig {
        min_seconds: 15,
        max_seconds: 30,
        targets: ["2/1/0", "2/1/1", "2/1/2", "2/1/3", "2/1/4"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        sequential_mode: false,
        avoid_repeat: true,
        history_size: 5,
    }
}

fn default_overlay_config() -> SwitcherConfig {
    SwitcherConfig {
        min_seconds: 600,
        max_seconds: 900,
        targets: vec!["2/2/1".to_string(), "3/0/3".to_string()],
        sequential_mode: false,
        avoid_repeat: true,
        history_size: 5,
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    ///
    /// Target identifiers are deliberately not validated here; malformed
    /// targets are surfaced when a dispatch for them is attempted.
    pub fn validate(&self) -> Result<()> {
        validate_switcher("camera", &self.camera)?;
        validate_switcher("overlay", &self.overlay)?;

        if let Some(channel) = self.midi.channel {
            if !(1..=16).contains(&channel) {
                bail!("midi.channel must be 1-16, got {}", channel);
            }
        }

        if self.statistics.auto_save_minutes == 0 {
            bail!("statistics.auto_save_minutes must be at least 1");
        }

        Ok(())
    }
}

fn validate_switcher(name: &str, cfg: &SwitcherConfig) -> Result<()> {
    if cfg.min_seconds == 0 {
        bail!("{}.min_seconds must be positive", name);
    }
    if cfg.min_seconds > cfg.max_seconds {
        bail!(
            "{}.min_seconds ({}) must not exceed {}.max_seconds ({})",
            name,
            cfg.min_seconds,
            name,
            cfg.max_seconds
        );
    }
    Ok(())
}

/// Parse a comma-separated target list ("2/1/0, 2/1/1") into entries
///
/// Used for host adapters that carry target lists as a single text field.
pub fn parse_target_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
