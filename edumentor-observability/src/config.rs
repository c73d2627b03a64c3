// Copyright 2025 EduMentor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Observability configuration
//!
//! Every field can be set from a config file section or overridden with an
//! `EDUMENTOR_*` environment variable.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub json_logs: bool,

    /// Directory receiving one file per finished trace
    pub traces_dir: PathBuf,
    /// Structured activity log (JSON array)
    pub activity_log_path: PathBuf,
    /// Metrics report written by `save_metrics`
    pub metrics_report_path: PathBuf,

    /// Errors kept by the metrics collector (older ones are dropped)
    pub max_error_log: usize,
    /// Entries kept by the activity log
    pub max_activity_entries: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            traces_dir: PathBuf::from("traces"),
            activity_log_path: PathBuf::from("agent_logs.json"),
            metrics_report_path: PathBuf::from("metrics_report.json"),
            max_error_log: 1_000,
            max_activity_entries: 1_000,
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `EDUMENTOR_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = env::var("EDUMENTOR_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Ok(json) = env::var("EDUMENTOR_LOG_JSON") {
            self.json_logs = json == "true";
        }

        if let Ok(dir) = env::var("EDUMENTOR_TRACES_DIR") {
            self.traces_dir = PathBuf::from(dir);
        }

        if let Ok(path) = env::var("EDUMENTOR_ACTIVITY_LOG") {
            self.activity_log_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("EDUMENTOR_METRICS_REPORT") {
            self.metrics_report_path = PathBuf::from(path);
        }

        if let Some(max) = env::var("EDUMENTOR_MAX_ERROR_LOG")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.max_error_log = max;
        }

        self
    }

    /// Re-root the relative output paths under `dir`
    pub fn rooted_at(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        for path in [
            &mut self.traces_dir,
            &mut self.activity_log_path,
            &mut self.metrics_report_path,
        ] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert_eq!(config.max_error_log, 1_000);
    }

    #[test]
    fn test_from_env() {
        env::set_var("EDUMENTOR_MAX_ERROR_LOG", "25");
        let config = ObservabilityConfig::from_env();
        assert_eq!(config.max_error_log, 25);
        env::remove_var("EDUMENTOR_MAX_ERROR_LOG");
    }

    #[test]
    fn test_rooted_at() {
        let config = ObservabilityConfig {
            metrics_report_path: PathBuf::from("/abs/report.json"),
            ..Default::default()
        }
        .rooted_at("/data");

        assert_eq!(config.traces_dir, PathBuf::from("/data/traces"));
        assert_eq!(config.activity_log_path, PathBuf::from("/data/agent_logs.json"));
        assert_eq!(config.metrics_report_path, PathBuf::from("/abs/report.json"));
    }
}
