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

//! Long-term student memory
//!
//! The memory bank outlives sessions: it keeps an append-only list of
//! `{timestamp, content}` entries per (student, memory type) and rewrites the
//! whole store to disk after every write.

use crate::config::MemoryConfig;
use crate::error::MemoryResult;
use crate::storage::JsonFile;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// One remembered fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(deserialize_with = "crate::storage::deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub content: serde_json::Value,
}

/// A student's memories grouped by type
///
/// Types keep the order in which they were first written, both in memory and
/// in the JSON document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentMemories {
    buckets: Vec<(String, Vec<MemoryEntry>)>,
}

impl StudentMemories {
    fn bucket_mut(&mut self, memory_type: &str) -> &mut Vec<MemoryEntry> {
        let index = match self.buckets.iter().position(|(t, _)| t == memory_type) {
            Some(index) => index,
            None => {
                self.buckets.push((memory_type.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index].1
    }

    pub fn get(&self, memory_type: &str) -> Option<&[MemoryEntry]> {
        self.buckets
            .iter()
            .find(|(t, _)| t == memory_type)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn memory_types(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(t, _)| t.as_str())
    }

    /// Every entry, bucket by bucket
    pub fn all(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.buckets.iter().flat_map(|(_, entries)| entries.iter())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|(_, entries)| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for StudentMemories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.buckets.iter().map(|(t, entries)| (t, entries)))
    }
}

impl<'de> Deserialize<'de> for StudentMemories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BucketsVisitor;

        impl<'de> Visitor<'de> for BucketsVisitor {
            type Value = StudentMemories;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of memory type to memory entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut memories = StudentMemories::default();
                while let Some((memory_type, entries)) =
                    map.next_entry::<String, Vec<MemoryEntry>>()?
                {
                    memories.bucket_mut(&memory_type).extend(entries);
                }
                Ok(memories)
            }
        }

        deserializer.deserialize_map(BucketsVisitor)
    }
}

/// Store contents keyed by student ID
pub type MemoryStore = BTreeMap<String, StudentMemories>;

/// Summary of what the bank knows about a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub memory_types: Vec<String>,
    pub total_memories: usize,
    pub last_updated: DateTime<Utc>,
}

/// Durable per-student memory store
#[derive(Debug)]
pub struct MemoryBank {
    memories: RwLock<MemoryStore>,
    sink: JsonFile,
}

impl MemoryBank {
    /// Open the bank at `path`, starting empty if the file is missing or
    /// unreadable
    pub fn new(path: impl AsRef<Path>) -> Self {
        let sink = JsonFile::new(path);
        let memories: MemoryStore = sink.read_or_default();
        info!(
            students = memories.len(),
            path = %sink.path().display(),
            "memory bank opened"
        );

        Self {
            memories: RwLock::new(memories),
            sink,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.memory_path())
    }

    /// Append a memory and persist the whole store
    ///
    /// The entry is kept in memory even when the write fails; the error is
    /// returned for the caller to report.
    pub fn add_memory(
        &self,
        student_id: &str,
        memory_type: &str,
        content: impl Into<serde_json::Value>,
    ) -> MemoryResult<()> {
        self.add_memory_at(student_id, memory_type, content, Utc::now())
    }

    pub fn add_memory_at(
        &self,
        student_id: &str,
        memory_type: &str,
        content: impl Into<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> MemoryResult<()> {
        let mut memories = self.memories.write();
        memories
            .entry(student_id.to_string())
            .or_default()
            .bucket_mut(memory_type)
            .push(MemoryEntry {
                timestamp: now,
                content: content.into(),
            });
        debug!(student_id, memory_type, "memory added");

        self.sink.write(&*memories)
    }

    /// Memories of a student, optionally restricted to one type
    ///
    /// Unknown students and types yield an empty list.
    pub fn get_student_memories(
        &self,
        student_id: &str,
        memory_type: Option<&str>,
    ) -> Vec<MemoryEntry> {
        let memories = self.memories.read();
        let Some(student) = memories.get(student_id) else {
            return Vec::new();
        };

        match memory_type {
            Some(memory_type) => student
                .get(memory_type)
                .map(|entries| entries.to_vec())
                .unwrap_or_default(),
            None => student.all().cloned().collect(),
        }
    }

    pub fn get_student_profile(&self, student_id: &str) -> StudentProfile {
        let memories = self.memories.read();
        let (memory_types, total_memories): (Vec<String>, usize) = memories
            .get(student_id)
            .map(|student| {
                (
                    student.memory_types().map(str::to_string).collect(),
                    student.len(),
                )
            })
            .unwrap_or_default();

        StudentProfile {
            student_id: student_id.to_string(),
            memory_types,
            total_memories,
            last_updated: Utc::now(),
        }
    }

    pub fn student_count(&self) -> usize {
        self.memories.read().len()
    }

    /// Rewrite the store file from the in-memory state
    pub fn save_memories(&self) -> MemoryResult<()> {
        let memories = self.memories.read();
        self.sink.write(&*memories)
    }

    /// Read a store file, `None` when it does not exist
    pub fn load_memories(path: impl AsRef<Path>) -> MemoryResult<Option<MemoryStore>> {
        JsonFile::new(path).read()
    }
}
