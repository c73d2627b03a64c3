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

//! Student sessions
//!
//! A session is one student's bounded-lifetime interaction record. Every
//! query/response pair handed to [`Session::add_interaction`] is appended to
//! the interaction log and folded into the rolling progress and context
//! state. Sessions are never deleted while active; the
//! [`SessionManager`](crate::manager::SessionManager) evicts them once they
//! have been idle past a timeout.

use crate::error::MemoryResult;
use crate::storage::JsonFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Longest response text kept in an interaction record, in characters
pub const MAX_STORED_RESPONSE_CHARS: usize = 500;

/// Number of recent topics kept in the context memory
pub const MAX_RECENT_TOPICS: usize = 10;

/// Number of recent topics surfaced in a summary
pub const SUMMARY_RECENT_TOPICS: usize = 5;

/// Difficulty level of a fresh session
pub const DEFAULT_DIFFICULTY: &str = "intermediate";

/// Closed subject vocabulary, in tie-break order
pub const SUBJECT_VOCABULARY: [&str; 5] = ["math", "science", "history", "programming", "literature"];

/// Keywords that identify a subject when no subject name appears in the
/// query. Listed in [`SUBJECT_VOCABULARY`] order.
const SUBJECT_KEYWORDS: [(&str, &[&str]); 5] = [
    (
        "math",
        &["algebra", "geometry", "calculus", "pythagorean", "equation", "fraction"],
    ),
    (
        "science",
        &["photosynthesis", "biology", "chemistry", "physics", "molecule", "ecosystem"],
    ),
    ("history", &["revolution", "civilization", "empire", "ancient"]),
    ("programming", &["algorithm", "python", "javascript", "compiler", "coding"]),
    ("literature", &["poem", "poetry", "novel", "shakespeare"]),
];

/// Free-form metadata attached to an interaction
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Tag a query with the first matching subject, if any
///
/// Matching is a case-insensitive substring test. Subject names win over
/// keywords; within each pass the earliest subject in
/// [`SUBJECT_VOCABULARY`] wins.
pub fn detect_subject(query: &str) -> Option<&'static str> {
    let query = query.to_lowercase();
    SUBJECT_VOCABULARY
        .iter()
        .copied()
        .find(|subject| query.contains(*subject))
        .or_else(|| {
            SUBJECT_KEYWORDS
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| query.contains(k)))
                .map(|(subject, _)| *subject)
        })
}

/// One recorded query/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    /// Response text, truncated to [`MAX_STORED_RESPONSE_CHARS`]
    pub response: String,
    /// Seconds since the previous recorded activity (not agent latency)
    pub response_time: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Learning progress derived from the interactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressTracking {
    pub subjects_studied: BTreeSet<String>,
    pub questions_asked: usize,
    pub average_score: f64,
    pub weak_areas: Vec<String>,
    pub strong_areas: Vec<String>,
}

/// Rolling conversational context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMemory {
    /// Most recent last, at most [`MAX_RECENT_TOPICS`] entries
    pub recent_topics: Vec<String>,
    pub learning_style: Option<String>,
    pub difficulty_level: String,
}

impl Default for ContextMemory {
    fn default() -> Self {
        Self {
            recent_topics: Vec::new(),
            learning_style: None,
            difficulty_level: DEFAULT_DIFFICULTY.to_string(),
        }
    }
}

/// Derived view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub student_id: String,
    pub duration_minutes: f64,
    pub total_interactions: usize,
    pub active_subjects: Vec<String>,
    pub learning_style: Option<String>,
    pub difficulty_level: String,
    /// Last [`SUMMARY_RECENT_TOPICS`] topics
    pub recent_topics: Vec<String>,
    pub session_age_minutes: f64,
}

/// One student's interaction record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    student_id: String,
    session_id: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    interactions: Vec<Interaction>,
    progress_tracking: ProgressTracking,
    context_memory: ContextMemory,
}

/// Build the default session ID from a student ID and creation instant
pub fn default_session_id(student_id: &str, created_at: DateTime<Utc>) -> String {
    format!(
        "session_{}_{}.{:06}",
        student_id,
        created_at.timestamp(),
        created_at.timestamp_subsec_micros()
    )
}

fn minutes_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 60_000.0
}

impl Session {
    /// Create a session with a generated ID
    pub fn new(student_id: impl Into<String>) -> Self {
        Self::new_at(student_id, None, Utc::now())
    }

    /// Create a session with an explicit ID
    pub fn with_id(student_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::new_at(student_id, Some(session_id.into()), Utc::now())
    }

    /// Create a session as of `now`
    pub fn new_at(
        student_id: impl Into<String>,
        session_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let student_id = student_id.into();
        let session_id = session_id.unwrap_or_else(|| default_session_id(&student_id, now));

        Self {
            student_id,
            session_id,
            created_at: now,
            last_activity: now,
            interactions: Vec::new(),
            progress_tracking: ProgressTracking::default(),
            context_memory: ContextMemory::default(),
        }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn progress(&self) -> &ProgressTracking {
        &self.progress_tracking
    }

    pub fn context(&self) -> &ContextMemory {
        &self.context_memory
    }

    /// Record a query/response exchange
    pub fn add_interaction(&mut self, query: &str, response: &str, metadata: Option<Metadata>) {
        self.add_interaction_at(query, response, metadata, Utc::now());
    }

    /// Record a query/response exchange as of `now`
    ///
    /// An instant earlier than the last recorded activity is clamped to it,
    /// keeping `last_activity` monotonic.
    pub fn add_interaction_at(
        &mut self,
        query: &str,
        response: &str,
        metadata: Option<Metadata>,
        now: DateTime<Utc>,
    ) {
        let now = now.max(self.last_activity);
        let response_time = (now - self.last_activity).num_microseconds().unwrap_or(i64::MAX) as f64
            / 1_000_000.0;

        self.interactions.push(Interaction {
            timestamp: now,
            query: query.to_string(),
            response: response.chars().take(MAX_STORED_RESPONSE_CHARS).collect(),
            response_time,
            metadata: metadata.unwrap_or_default(),
        });
        self.last_activity = now;

        self.progress_tracking.questions_asked += 1;

        if let Some(subject) = detect_subject(query) {
            self.progress_tracking
                .subjects_studied
                .insert(subject.to_string());
            self.context_memory.recent_topics.push(subject.to_string());
        }

        let topics = &mut self.context_memory.recent_topics;
        if topics.len() > MAX_RECENT_TOPICS {
            topics.drain(..topics.len() - MAX_RECENT_TOPICS);
        }
    }

    pub fn update_learning_style(&mut self, style: impl Into<String>) {
        self.context_memory.learning_style = Some(style.into());
    }

    pub fn update_difficulty(&mut self, level: impl Into<String>) {
        self.context_memory.difficulty_level = level.into();
    }

    pub fn get_session_summary(&self) -> SessionSummary {
        self.get_session_summary_at(Utc::now())
    }

    pub fn get_session_summary_at(&self, now: DateTime<Utc>) -> SessionSummary {
        let topics = &self.context_memory.recent_topics;
        let recent_start = topics.len().saturating_sub(SUMMARY_RECENT_TOPICS);

        SessionSummary {
            session_id: self.session_id.clone(),
            student_id: self.student_id.clone(),
            duration_minutes: minutes_between(now, self.created_at),
            total_interactions: self.interactions.len(),
            active_subjects: self
                .progress_tracking
                .subjects_studied
                .iter()
                .cloned()
                .collect(),
            learning_style: self.context_memory.learning_style.clone(),
            difficulty_level: self.context_memory.difficulty_level.clone(),
            recent_topics: topics[recent_start..].to_vec(),
            session_age_minutes: minutes_between(now, self.last_activity),
        }
    }

    /// Whether the session saw activity within the last `timeout_minutes`
    ///
    /// Callers without a configured window pass
    /// [`DEFAULT_SESSION_TIMEOUT_MINUTES`](crate::config::DEFAULT_SESSION_TIMEOUT_MINUTES).
    pub fn is_active(&self, timeout_minutes: i64) -> bool {
        self.is_active_at(Utc::now(), timeout_minutes)
    }

    /// Whether `now - last_activity` is strictly below `timeout_minutes`
    pub fn is_active_at(&self, now: DateTime<Utc>, timeout_minutes: i64) -> bool {
        let idle_ms = (now - self.last_activity).num_milliseconds();
        idle_ms < timeout_minutes.saturating_mul(60_000)
    }

    /// Write the full session, interactions included, as JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> MemoryResult<()> {
        JsonFile::new(path).write(self)
    }

    /// Read a session written by [`Session::save_to_file`]
    pub fn load_from_file(path: impl AsRef<Path>) -> MemoryResult<Option<Self>> {
        JsonFile::new(path).read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_photosynthesis_tags_science() {
        let mut session = Session::new("S1");
        session.add_interaction("Explain photosynthesis", "Plants convert light...", None);

        let progress = session.progress();
        assert_eq!(progress.questions_asked, 1);
        assert_eq!(
            progress.subjects_studied.iter().collect::<Vec<_>>(),
            vec!["science"]
        );
        assert_eq!(session.context().recent_topics, vec!["science".to_string()]);
    }

    #[test]
    fn test_first_subject_wins() {
        assert_eq!(detect_subject("Is MATH a science?"), Some("math"));
        assert_eq!(detect_subject("science and history"), Some("science"));
        assert_eq!(detect_subject("Tell me about the French Revolution"), Some("history"));
        assert_eq!(detect_subject("hello there"), None);
    }

    #[test]
    fn test_subject_name_beats_keyword() {
        assert_eq!(detect_subject("The history of algebra"), Some("history"));
        assert_eq!(detect_subject("python for literature students"), Some("literature"));
        assert_eq!(detect_subject("algebra and chemistry"), Some("math"));
    }

    #[test]
    fn test_untagged_query_leaves_topics() {
        let mut session = Session::new("S1");
        session.add_interaction("good morning", "hi", None);
        assert!(session.context().recent_topics.is_empty());
        assert!(session.progress().subjects_studied.is_empty());
        assert_eq!(session.progress().questions_asked, 1);
    }

    #[test]
    fn test_response_truncated_by_chars() {
        let mut session = Session::new("S1");
        let long = "é".repeat(MAX_STORED_RESPONSE_CHARS + 20);
        session.add_interaction("q", &long, None);
        assert_eq!(
            session.interactions()[0].response.chars().count(),
            MAX_STORED_RESPONSE_CHARS
        );
    }

    #[test]
    fn test_recent_topics_bounded() {
        let mut session = Session::new("S1");
        for i in 0..12 {
            let query = if i % 2 == 0 { "math drill" } else { "history quiz" };
            session.add_interaction(query, "ok", None);
        }
        assert_eq!(session.context().recent_topics.len(), MAX_RECENT_TOPICS);
        assert_eq!(session.context().recent_topics.last().unwrap(), "history");

        let summary = session.get_session_summary();
        assert_eq!(summary.recent_topics.len(), SUMMARY_RECENT_TOPICS);
        assert_eq!(summary.active_subjects, vec!["history", "math"]);
    }

    #[test]
    fn test_response_time_is_gap_since_last_activity() {
        let start = Utc::now();
        let mut session = Session::new_at("S1", None, start);
        session.add_interaction_at("q1", "a1", None, start + Duration::seconds(90));
        session.add_interaction_at("q2", "a2", None, start + Duration::seconds(100));

        assert_eq!(session.interactions()[0].response_time, 90.0);
        assert_eq!(session.interactions()[1].response_time, 10.0);
        assert_eq!(session.last_activity(), start + Duration::seconds(100));
    }

    #[test]
    fn test_past_instant_is_clamped() {
        let start = Utc::now();
        let mut session = Session::new_at("S1", None, start);
        session.add_interaction_at("q", "a", None, start - Duration::minutes(5));
        assert_eq!(session.last_activity(), start);
        assert_eq!(session.interactions()[0].response_time, 0.0);
    }

    #[test]
    fn test_is_active_window() {
        let start = Utc::now();
        let session = Session::new_at("S1", None, start);

        assert!(session.is_active_at(start + Duration::minutes(29), 30));
        assert!(!session.is_active_at(start + Duration::minutes(30), 30));
        assert!(session.is_active_at(start + Duration::minutes(30), 31));

        let fresh = Session::new("S2");
        assert!(fresh.is_active(crate::config::DEFAULT_SESSION_TIMEOUT_MINUTES));
        assert!(!fresh.is_active(0));
    }

    #[test]
    fn test_summary_minutes() {
        let start = Utc::now();
        let mut session = Session::new_at("S1", Some("fixed".to_string()), start);
        session.add_interaction_at("q", "a", None, start + Duration::minutes(3));
        session.update_learning_style("visual");
        session.update_difficulty("advanced");

        let summary = session.get_session_summary_at(start + Duration::minutes(10));
        assert_eq!(summary.session_id, "fixed");
        assert_eq!(summary.duration_minutes, 10.0);
        assert_eq!(summary.session_age_minutes, 7.0);
        assert_eq!(summary.total_interactions, 1);
        assert_eq!(summary.learning_style.as_deref(), Some("visual"));
        assert_eq!(summary.difficulty_level, "advanced");
    }

    #[test]
    fn test_default_id_derives_from_student() {
        let session = Session::new("alice");
        assert!(session.session_id().starts_with("session_alice_"));
        assert_eq!(session.context().difficulty_level, DEFAULT_DIFFICULTY);
    }

    #[test]
    fn test_file_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut metadata = Metadata::new();
        metadata.insert("agent".to_string(), serde_json::json!("tutor"));

        let mut session = Session::new("S1");
        session.add_interaction("algebra help", "sure", Some(metadata));
        session.save_to_file(&path).unwrap();

        let loaded = Session::load_from_file(&path).unwrap().unwrap();
        assert_eq!(loaded.session_id(), session.session_id());
        assert_eq!(loaded.interactions(), session.interactions());
        assert_eq!(loaded.interactions()[0].metadata["agent"], "tutor");
    }
}
