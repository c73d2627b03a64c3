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

//! Agent execution traces
//!
//! A trace is the envelope of one logical request; spans are the timed
//! sub-operations inside it. Ending a trace writes `trace_{id}.json` into
//! the traces directory.

use crate::export::{truncate_chars, write_json};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Longest result text kept on a span or trace
pub const MAX_RESULT_CHARS: usize = 200;

/// Finished traces kept in memory for inspection
const RETAINED_TRACES: usize = 100;

pub type Attributes = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub span_name: String,
    pub agent: String,
    pub start_time: DateTime<Utc>,
    pub details: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub operation: String,
    pub start_time: DateTime<Utc>,
    pub metadata: Attributes,
    pub spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn seconds_between(end: DateTime<Utc>, start: DateTime<Utc>) -> f64 {
    (end - start).num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
}

#[derive(Debug, Default)]
struct TracerState {
    /// Open traces, most recently started last
    open: Vec<Trace>,
    finished: VecDeque<Trace>,
}

impl TracerState {
    fn open_mut(&mut self, trace_id: &str) -> Option<&mut Trace> {
        self.open.iter_mut().find(|t| t.trace_id == trace_id)
    }
}

fn push_span(trace: &mut Trace, span_name: &str, agent: &str, details: Option<Attributes>) -> usize {
    trace.spans.push(Span {
        span_name: span_name.to_string(),
        agent: agent.to_string(),
        start_time: Utc::now(),
        details: details.unwrap_or_default(),
        end_time: None,
        duration: None,
        result: None,
        error: None,
    });
    trace.spans.len() - 1
}

fn close_span(trace: &mut Trace, span_index: usize, result: Option<&str>, error: Option<&str>) {
    let Some(span) = trace.spans.get_mut(span_index) else {
        return;
    };

    let now = Utc::now();
    span.end_time = Some(now);
    span.duration = Some(seconds_between(now, span.start_time));
    span.result = result
        .filter(|r| !r.is_empty())
        .map(|r| truncate_chars(r, MAX_RESULT_CHARS));
    span.error = error.map(str::to_string);
}

/// Tracer for agent operations
///
/// Several traces may be open at once. The unqualified operations act on
/// the most recently started open trace; the `trace_id` variants address one
/// trace explicitly and are what concurrent or nested callers use.
#[derive(Debug)]
pub struct AgentTracer {
    state: Mutex<TracerState>,
    traces_dir: PathBuf,
}

impl AgentTracer {
    /// Tracer writing finished traces under `traces_dir`
    pub fn new(traces_dir: impl AsRef<Path>) -> Self {
        Self {
            state: Mutex::new(TracerState::default()),
            traces_dir: traces_dir.as_ref().to_path_buf(),
        }
    }

    pub fn traces_dir(&self) -> &Path {
        &self.traces_dir
    }

    /// Open a new trace, make it current and return its ID
    pub fn start_trace(&self, operation: &str, metadata: Option<Attributes>) -> String {
        let trace_id = format!("{}_{}", operation, Uuid::new_v4().simple());
        let trace = Trace {
            trace_id: trace_id.clone(),
            operation: operation.to_string(),
            start_time: Utc::now(),
            metadata: metadata.unwrap_or_default(),
            spans: Vec::new(),
            end_time: None,
            duration: None,
            result: None,
            error: None,
        };

        self.state.lock().open.push(trace);
        debug!(trace_id = %trace_id, operation, "trace started");
        trace_id
    }

    /// The most recently started trace that is still open
    pub fn current_trace_id(&self) -> Option<String> {
        self.state.lock().open.last().map(|t| t.trace_id.clone())
    }

    /// Add a span to the current trace, returning its index
    pub fn add_span(&self, span_name: &str, agent: &str, details: Option<Attributes>) -> Option<usize> {
        let mut state = self.state.lock();
        let trace = state.open.last_mut()?;
        Some(push_span(trace, span_name, agent, details))
    }

    /// Add a span to the open trace `trace_id`, returning its index
    pub fn add_span_to(
        &self,
        trace_id: &str,
        span_name: &str,
        agent: &str,
        details: Option<Attributes>,
    ) -> Option<usize> {
        let mut state = self.state.lock();
        let trace = state.open_mut(trace_id)?;
        Some(push_span(trace, span_name, agent, details))
    }

    /// Close a span of the current trace. Unknown indexes are ignored.
    pub fn end_span(&self, span_index: usize, result: Option<&str>, error: Option<&str>) {
        let mut state = self.state.lock();
        if let Some(trace) = state.open.last_mut() {
            close_span(trace, span_index, result, error);
        }
    }

    /// Close a span of the open trace `trace_id`
    pub fn end_span_in(
        &self,
        trace_id: &str,
        span_index: usize,
        result: Option<&str>,
        error: Option<&str>,
    ) {
        let mut state = self.state.lock();
        if let Some(trace) = state.open_mut(trace_id) {
            close_span(trace, span_index, result, error);
        }
    }

    /// Close the current trace and write it to disk
    ///
    /// Returns the trace ID, or `None` when no trace was open. A failed write
    /// is logged and the trace is still retained in memory.
    pub fn end_trace(&self, result: Option<&str>, error: Option<&str>) -> Option<String> {
        let mut state = self.state.lock();
        let trace = state.open.pop()?;
        Some(self.finish(&mut state, trace, result, error))
    }

    /// Close the open trace `trace_id` and write it to disk
    pub fn finish_trace(
        &self,
        trace_id: &str,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Option<String> {
        let mut state = self.state.lock();
        let position = state.open.iter().position(|t| t.trace_id == trace_id)?;
        let trace = state.open.remove(position);
        Some(self.finish(&mut state, trace, result, error))
    }

    fn finish(
        &self,
        state: &mut TracerState,
        mut trace: Trace,
        result: Option<&str>,
        error: Option<&str>,
    ) -> String {
        let now = Utc::now();
        trace.end_time = Some(now);
        trace.duration = Some(seconds_between(now, trace.start_time));
        trace.result = result
            .filter(|r| !r.is_empty())
            .map(|r| truncate_chars(r, MAX_RESULT_CHARS));
        trace.error = error.map(str::to_string);

        let path = self.trace_path(&trace.trace_id);
        if let Err(e) = write_json(&path, &trace) {
            warn!(path = %path.display(), error = %e, "failed to save trace");
        }

        let trace_id = trace.trace_id.clone();
        state.finished.push_back(trace);
        while state.finished.len() > RETAINED_TRACES {
            state.finished.pop_front();
        }
        trace_id
    }

    /// A recently finished trace
    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        self.state
            .lock()
            .finished
            .iter()
            .find(|t| t.trace_id == trace_id)
            .cloned()
    }

    pub fn trace_path(&self, trace_id: &str) -> PathBuf {
        self.traces_dir.join(format!("trace_{trace_id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_trace_lifecycle() {
        let dir = tempdir().unwrap();
        let tracer = AgentTracer::new(dir.path().join("traces"));

        let mut metadata = Attributes::new();
        metadata.insert("agent".to_string(), json!("TutorAgent"));
        let trace_id = tracer.start_trace("assist", Some(metadata));
        assert!(trace_id.starts_with("assist_"));

        let span = tracer.add_span("operation_execution", "TutorAgent", None).unwrap();
        let long_result = "r".repeat(500);
        tracer.end_span(span, Some(&long_result), None);
        assert_eq!(tracer.end_trace(Some("done"), None), Some(trace_id.clone()));
        assert!(tracer.current_trace_id().is_none());

        let trace = tracer.get_trace(&trace_id).unwrap();
        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.spans[0].result.as_ref().unwrap().len(), MAX_RESULT_CHARS);
        assert!(trace.spans[0].duration.unwrap() >= 0.0);
        assert_eq!(trace.result.as_deref(), Some("done"));

        let written: Trace = serde_json::from_str(
            &std::fs::read_to_string(tracer.trace_path(&trace_id)).unwrap(),
        )
        .unwrap();
        assert_eq!(written, trace);
    }

    #[test]
    fn test_no_current_trace() {
        let dir = tempdir().unwrap();
        let tracer = AgentTracer::new(dir.path());

        assert!(tracer.add_span("s", "a", None).is_none());
        tracer.end_span(0, None, Some("boom"));
        assert!(tracer.end_trace(None, None).is_none());
    }

    #[test]
    fn test_error_recorded_and_bad_index_ignored() {
        let dir = tempdir().unwrap();
        let tracer = AgentTracer::new(dir.path());

        let trace_id = tracer.start_trace("evaluate", None);
        let span = tracer.add_span("operation_execution", "AssessmentAgent", None).unwrap();
        tracer.end_span(span + 3, Some("ignored"), None);
        tracer.end_span(span, None, Some("no rubric"));
        tracer.end_trace(None, Some("no rubric"));

        let trace = tracer.get_trace(&trace_id).unwrap();
        assert_eq!(trace.spans[0].error.as_deref(), Some("no rubric"));
        assert!(trace.spans[0].result.is_none());
        assert_eq!(trace.error.as_deref(), Some("no rubric"));
    }

    #[test]
    fn test_nested_traces_close_independently() {
        let dir = tempdir().unwrap();
        let tracer = AgentTracer::new(dir.path());

        let outer = tracer.start_trace("assist", None);
        let outer_span = tracer.add_span_to(&outer, "operation_execution", "main", None).unwrap();
        let inner = tracer.start_trace("evaluate", None);
        assert_eq!(tracer.current_trace_id(), Some(inner.clone()));

        let inner_span = tracer.add_span_to(&inner, "operation_execution", "assessor", None).unwrap();
        tracer.end_span_in(&outer, outer_span, Some("outer done"), None);
        tracer.end_span_in(&inner, inner_span, Some("inner done"), None);

        assert_eq!(tracer.finish_trace(&outer, Some("outer"), None), Some(outer.clone()));
        assert_eq!(tracer.current_trace_id(), Some(inner.clone()));
        assert_eq!(tracer.finish_trace(&inner, Some("inner"), None), Some(inner.clone()));
        assert!(tracer.current_trace_id().is_none());
        assert!(tracer.finish_trace(&inner, None, None).is_none());

        let outer_trace = tracer.get_trace(&outer).unwrap();
        assert_eq!(outer_trace.spans.len(), 1);
        assert_eq!(outer_trace.spans[0].agent, "main");
        assert_eq!(outer_trace.spans[0].result.as_deref(), Some("outer done"));
        assert_eq!(tracer.get_trace(&inner).unwrap().spans[0].agent, "assessor");
    }
}
