//! Statistics persistence
//!
//! Saves cumulative usage statistics to a JSON snapshot so totals survive
//! restarts. Written on the auto-save interval, on system stop, and on
//! shutdown.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Directory name under the platform data dir
const APP_DIR: &str = "showswitcher";

/// File name of the statistics snapshot
const STATS_FILE: &str = "showswitcher_stats.json";

/// Persisted usage statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_runtime_secs: u64,
    pub session_count: u64,
    pub camera_trigger_count: u64,
    pub overlay_trigger_count: u64,
    pub http_errors: u64,
    pub http_successes: u64,
    pub last_saved: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Default snapshot location: `<data dir>/showswitcher/showswitcher_stats.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(STATS_FILE)
    }

    /// Save as pretty-printed JSON, creating parent directories as needed
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize statistics snapshot")?;

        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write statistics to {}", path.display()))?;

        debug!("Statistics saved to {}", path.display());
        Ok(())
    }

    /// Load a previously saved snapshot
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read statistics file {}", path.display()))?;

        let snapshot: StatsSnapshot =
            serde_json::from_str(&json).context("Failed to parse statistics JSON")?;

        debug!(
            "Statistics loaded (last saved {})",
            snapshot.last_saved
        );
        Ok(snapshot)
    }
}
