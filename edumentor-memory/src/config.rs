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

//! Session and memory configuration

use crate::error::MemoryResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default inactivity window after which a session is considered expired
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

/// Configuration for the session manager and memory bank
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Data directory for persistent state
    pub data_dir: PathBuf,

    /// Session summary file, relative to `data_dir`
    pub sessions_file: String,

    /// Long-term memory file, relative to `data_dir`
    pub memory_file: String,

    /// Inactivity window used by `cleanup_inactive`
    pub session_timeout_minutes: i64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("edumentor");

        Self {
            data_dir,
            sessions_file: "sessions.json".to_string(),
            memory_file: "memory_bank.json".to_string(),
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
        }
    }
}

impl MemoryConfig {
    /// Config rooted at an explicit data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> MemoryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment overrides on top of this config
    ///
    /// Supported environment variables:
    /// - EDUMENTOR_DATA_DIR: data directory
    /// - EDUMENTOR_SESSIONS_FILE: session summary file name
    /// - EDUMENTOR_MEMORY_FILE: memory bank file name
    /// - EDUMENTOR_SESSION_TIMEOUT: inactivity timeout in minutes
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("EDUMENTOR_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(file) = std::env::var("EDUMENTOR_SESSIONS_FILE") {
            self.sessions_file = file;
        }

        if let Ok(file) = std::env::var("EDUMENTOR_MEMORY_FILE") {
            self.memory_file = file;
        }

        if let Ok(timeout) = std::env::var("EDUMENTOR_SESSION_TIMEOUT") {
            if let Ok(val) = timeout.parse() {
                self.session_timeout_minutes = val;
            }
        }

        self
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.data_dir.join(&self.sessions_file)
    }

    pub fn memory_path(&self) -> PathBuf {
        self.data_dir.join(&self.memory_file)
    }
}
