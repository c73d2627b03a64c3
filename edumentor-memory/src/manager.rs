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

//! Session manager
//!
//! Owns every live [`Session`] keyed by session ID. Mutations go through the
//! manager so each one can be followed by a snapshot of the summary view to
//! the sessions file. The snapshot holds derived counts only, never the
//! interaction bodies, so a reload restores how many sessions existed but not
//! their history.

use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::session::{Metadata, Session, SessionSummary};
use crate::storage::JsonFile;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Persisted summary of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub student_id: String,
    #[serde(deserialize_with = "crate::storage::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub interactions_count: usize,
    pub summary: SessionSummary,
}

/// Contents of the sessions file, keyed by session ID
///
/// Records keep session creation order, both in memory and in the JSON
/// document. A repeated key replaces the earlier record in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSessions {
    records: Vec<(String, PersistedSession)>,
}

impl PersistedSessions {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&PersistedSession> {
        self.records
            .iter()
            .find(|(id, _)| id == session_id)
            .map(|(_, record)| record)
    }

    pub fn session_ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(id, _)| id.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &PersistedSession> {
        self.records.iter().map(|(_, record)| record)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PersistedSession)> {
        self.records.iter().map(|(id, record)| (id.as_str(), record))
    }

    fn insert(&mut self, session_id: String, record: PersistedSession) {
        match self.records.iter_mut().find(|(id, _)| *id == session_id) {
            Some(slot) => slot.1 = record,
            None => self.records.push((session_id, record)),
        }
    }
}

impl FromIterator<(String, PersistedSession)> for PersistedSessions {
    fn from_iter<I: IntoIterator<Item = (String, PersistedSession)>>(iter: I) -> Self {
        let mut sessions = Self::default();
        for (session_id, record) in iter {
            sessions.insert(session_id, record);
        }
        sessions
    }
}

impl Serialize for PersistedSessions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.records.iter().map(|(id, record)| (id, record)))
    }
}

impl<'de> Deserialize<'de> for PersistedSessions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordsVisitor;

        impl<'de> Visitor<'de> for RecordsVisitor {
            type Value = PersistedSessions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of session ID to session summary")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut sessions = PersistedSessions::default();
                while let Some((session_id, record)) =
                    map.next_entry::<String, PersistedSession>()?
                {
                    sessions.insert(session_id, record);
                }
                Ok(sessions)
            }
        }

        deserializer.deserialize_map(RecordsVisitor)
    }
}

/// Aggregate counts over the managed sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_interactions: usize,
    pub avg_interactions_per_session: f64,
    pub unique_students: usize,
}

/// Sessions plus their insertion order
#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    order: Vec<String>,
}

impl SessionTable {
    fn iter(&self) -> impl Iterator<Item = &Session> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }

    fn remove(&mut self, session_id: &str) -> Option<Session> {
        let removed = self.sessions.remove(session_id);
        if removed.is_some() {
            self.order.retain(|id| id != session_id);
        }
        removed
    }

    fn snapshot(&self, now: DateTime<Utc>) -> PersistedSessions {
        self.iter()
            .map(|session| {
                let record = PersistedSession {
                    student_id: session.student_id().to_string(),
                    created_at: session.created_at(),
                    interactions_count: session.interactions().len(),
                    summary: session.get_session_summary_at(now),
                };
                (session.session_id().to_string(), record)
            })
            .collect()
    }
}

/// Owner of all live sessions
#[derive(Debug)]
pub struct SessionManager {
    table: RwLock<SessionTable>,
    sink: JsonFile,
    timeout_minutes: i64,
    prior_sessions: PersistedSessions,
}

impl SessionManager {
    /// Create a manager persisting to `path`, reading any previous snapshot
    pub fn new(path: impl AsRef<Path>, timeout_minutes: i64) -> Self {
        let sink = JsonFile::new(path);
        let prior_sessions = Self::read_snapshot(&sink);

        Self {
            table: RwLock::new(SessionTable::default()),
            sink,
            timeout_minutes,
            prior_sessions,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.sessions_path(), config.session_timeout_minutes)
    }

    pub fn timeout_minutes(&self) -> i64 {
        self.timeout_minutes
    }

    /// Session summaries found in the sessions file when the manager started
    pub fn prior_sessions(&self) -> &PersistedSessions {
        &self.prior_sessions
    }

    /// Start a new session for `student_id` and return a snapshot of it
    pub fn create_session(&self, student_id: &str) -> MemoryResult<Session> {
        self.create_session_at(student_id, Utc::now())
    }

    /// Start a new session created at `now`
    ///
    /// Fails with [`MemoryError::AlreadyExists`] if the derived ID is already
    /// taken; the existing session is left untouched.
    pub fn create_session_at(&self, student_id: &str, now: DateTime<Utc>) -> MemoryResult<Session> {
        let session = Session::new_at(student_id, None, now);
        let session_id = session.session_id().to_string();

        let mut table = self.table.write();
        if table.sessions.contains_key(&session_id) {
            return Err(MemoryError::AlreadyExists(session_id));
        }

        table.sessions.insert(session_id.clone(), session.clone());
        table.order.push(session_id.clone());
        info!(session_id = %session_id, student_id, "session created");

        self.persist(&table);
        Ok(session)
    }

    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.table.read().sessions.get(session_id).cloned()
    }

    /// All sessions of one student, oldest first
    pub fn get_student_sessions(&self, student_id: &str) -> Vec<Session> {
        self.table
            .read()
            .iter()
            .filter(|s| s.student_id() == student_id)
            .cloned()
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.table.read().sessions.len()
    }

    /// Record an exchange on a managed session
    pub fn record_interaction(
        &self,
        session_id: &str,
        query: &str,
        response: &str,
        metadata: Option<Metadata>,
    ) -> MemoryResult<()> {
        self.record_interaction_at(session_id, query, response, metadata, Utc::now())
    }

    pub fn record_interaction_at(
        &self,
        session_id: &str,
        query: &str,
        response: &str,
        metadata: Option<Metadata>,
        now: DateTime<Utc>,
    ) -> MemoryResult<()> {
        self.with_session_mut(session_id, |session| {
            session.add_interaction_at(query, response, metadata, now)
        })
    }

    pub fn update_learning_style(&self, session_id: &str, style: &str) -> MemoryResult<()> {
        self.with_session_mut(session_id, |session| session.update_learning_style(style))
    }

    pub fn update_difficulty(&self, session_id: &str, level: &str) -> MemoryResult<()> {
        self.with_session_mut(session_id, |session| session.update_difficulty(level))
    }

    fn with_session_mut<F>(&self, session_id: &str, f: F) -> MemoryResult<()>
    where
        F: FnOnce(&mut Session),
    {
        let mut table = self.table.write();
        let session = table
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| MemoryError::SessionNotFound(session_id.to_string()))?;
        f(session);

        self.persist(&table);
        Ok(())
    }

    /// End a session, logging its summary
    ///
    /// Unknown IDs are ignored. The session stays registered until
    /// [`SessionManager::cleanup_inactive`] evicts it.
    pub fn end_session(&self, session_id: &str) -> Option<SessionSummary> {
        let table = self.table.write();
        let summary = table.sessions.get(session_id)?.get_session_summary();
        log_ended(&summary);

        self.persist(&table);
        Some(summary)
    }

    /// End and remove every session idle for at least `timeout_minutes`
    ///
    /// All sessions are judged against a single instant. Returns the removed
    /// session IDs in insertion order.
    pub fn cleanup_inactive(&self, timeout_minutes: i64) -> Vec<String> {
        self.cleanup_inactive_at(Utc::now(), timeout_minutes)
    }

    pub fn cleanup_inactive_at(&self, now: DateTime<Utc>, timeout_minutes: i64) -> Vec<String> {
        let mut table = self.table.write();

        let inactive: Vec<String> = table
            .iter()
            .filter(|s| !s.is_active_at(now, timeout_minutes))
            .map(|s| s.session_id().to_string())
            .collect();

        if inactive.is_empty() {
            return inactive;
        }

        for session_id in &inactive {
            if let Some(session) = table.remove(session_id) {
                log_ended(&session.get_session_summary_at(now));
            }
        }
        info!(removed = inactive.len(), "cleaned up inactive sessions");

        self.persist(&table);
        inactive
    }

    /// Write the summary view of all sessions to the sessions file
    pub fn save_sessions(&self) -> MemoryResult<()> {
        let table = self.table.read();
        self.sink.write(&table.snapshot(Utc::now()))
    }

    /// Read the sessions file, treating a missing or malformed file as empty
    pub fn load_sessions(&self) -> PersistedSessions {
        Self::read_snapshot(&self.sink)
    }

    fn read_snapshot(sink: &JsonFile) -> PersistedSessions {
        let sessions: PersistedSessions = sink.read_or_default();
        info!(
            count = sessions.len(),
            path = %sink.path().display(),
            "loaded session summaries"
        );
        sessions
    }

    fn persist(&self, table: &SessionTable) {
        if let Err(e) = self.sink.write(&table.snapshot(Utc::now())) {
            warn!(path = %self.sink.path().display(), error = %e, "failed to persist sessions");
        }
    }

    pub fn get_system_metrics(&self) -> SystemMetrics {
        self.get_system_metrics_at(Utc::now())
    }

    pub fn get_system_metrics_at(&self, now: DateTime<Utc>) -> SystemMetrics {
        let table = self.table.read();

        let total_sessions = table.sessions.len();
        let active_sessions = table
            .sessions
            .values()
            .filter(|s| s.is_active_at(now, self.timeout_minutes))
            .count();
        let total_interactions: usize = table
            .sessions
            .values()
            .map(|s| s.interactions().len())
            .sum();
        let unique_students = table
            .sessions
            .values()
            .map(|s| s.student_id())
            .collect::<HashSet<_>>()
            .len();

        let avg_interactions_per_session = if total_sessions == 0 {
            0.0
        } else {
            total_interactions as f64 / total_sessions as f64
        };

        SystemMetrics {
            total_sessions,
            active_sessions,
            total_interactions,
            avg_interactions_per_session,
            unique_students,
        }
    }
}

fn log_ended(summary: &SessionSummary) {
    info!(
        session_id = %summary.session_id,
        student_id = %summary.student_id,
        interactions = summary.total_interactions,
        duration_minutes = summary.duration_minutes,
        "session ended"
    );
    match serde_json::to_string(summary) {
        Ok(json) => debug!(summary = %json, "session summary"),
        Err(e) => warn!(error = %e, "could not serialize session summary"),
    }
}
