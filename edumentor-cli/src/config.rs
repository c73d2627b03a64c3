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

//! Application configuration
//!
//! One TOML file with a `[memory]` and an `[observability]` table. Values
//! are layered: defaults, then the file, then `EDUMENTOR_*` variables, then
//! command-line flags.

use anyhow::{Context, Result};
use edumentor_memory::MemoryConfig;
use edumentor_observability::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub memory: MemoryConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Resolve the effective configuration
    ///
    /// Relative observability outputs are placed under the data directory.
    pub fn load(file: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let mut memory = config.memory.with_env_overrides();
        if let Some(dir) = data_dir {
            memory.data_dir = dir;
        }
        let observability = config
            .observability
            .with_env_overrides()
            .rooted_at(memory.data_dir.clone());

        Ok(Self {
            memory,
            observability,
        })
    }
}
