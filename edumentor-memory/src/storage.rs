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

//! JSON file sinks
//!
//! Every persisted view in this crate is a single pretty-printed JSON
//! document that is rewritten in full on each save. Writes go to a sibling
//! temporary file first and are renamed into place, so readers never observe
//! a half-written document.

use crate::error::MemoryResult;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the document with `value`
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> MemoryResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(value)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), "persisted json document");
        Ok(())
    }

    /// Read the document, `None` when the file does not exist
    pub fn read<T: DeserializeOwned>(&self) -> MemoryResult<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let value = serde_json::from_str(&content)?;
        Ok(Some(value))
    }

    /// Read the document, falling back to `T::default()` when it is missing
    /// or cannot be parsed
    pub fn read_or_default<T: DeserializeOwned + Default>(&self) -> T {
        match self.read() {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(path = %self.path.display(), "no existing file, starting empty");
                T::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable file, starting empty");
                T::default()
            }
        }
    }
}

/// Parse an ISO-8601 timestamp; values without an offset are taken as UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or(rfc_err),
    }
}

/// `deserialize_with` adapter for [`parse_timestamp`]
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
