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

//! Structured agent activity log
//!
//! Keeps the most recent agent events as JSON entries, rewriting the log file
//! after each one, and mirrors every event to `tracing`.

use crate::export::{short_type_name, write_json};
use crate::tracer::Attributes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Default number of entries kept
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub activity: String,
    pub level: ActivityLevel,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub details: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub context: Attributes,
}

/// Bounded activity log backed by a JSON file
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    path: PathBuf,
    max_entries: usize,
}

impl ActivityLog {
    /// Open the log at `path`, keeping entries already there
    pub fn new(path: impl AsRef<Path>, max_entries: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut entries = read_existing(&path);
        while entries.len() > max_entries {
            entries.pop_front();
        }
        info!(path = %path.display(), entries = entries.len(), "agent activity log initialized");

        Self {
            entries: Mutex::new(entries),
            path,
            max_entries,
        }
    }

    pub fn log_agent_activity(&self, agent: &str, activity: &str, details: Option<Attributes>) {
        let details = details.unwrap_or_default();
        info!(agent, "{activity}");
        if !details.is_empty() {
            debug!(agent, details = %serde_json::Value::Object(details.clone()), "activity details");
        }

        self.append(ActivityEntry {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            activity: activity.to_string(),
            level: ActivityLevel::Info,
            details,
            error_type: None,
            error_message: None,
            context: Attributes::new(),
        });
    }

    pub fn log_error<E: fmt::Display + ?Sized>(
        &self,
        agent: &str,
        err: &E,
        context: Option<Attributes>,
    ) {
        let error_type = short_type_name::<E>();
        error!(agent, error_type, "{agent} error: {err}");

        self.append(ActivityEntry {
            timestamp: Utc::now(),
            agent: agent.to_string(),
            activity: "ERROR".to_string(),
            level: ActivityLevel::Error,
            details: Attributes::new(),
            error_type: Some(error_type.to_string()),
            error_message: Some(err.to_string()),
            context: context.unwrap_or_default(),
        });
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, entry: ActivityEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }

        if let Err(e) = write_json(&self.path, &*entries) {
            warn!(path = %self.path.display(), error = %e, "failed to write activity log");
        }
    }
}

fn read_existing(path: &Path) -> VecDeque<ActivityEntry> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return VecDeque::new(),
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unreadable activity log");
        VecDeque::new()
    })
}
