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

//! Agent call instrumentation
//!
//! Wraps an agent call, times it and reports the outcome. The wrapped call's
//! `Result` is handed back untouched: failures are observed, never swallowed
//! or altered.

use crate::activity_log::ActivityLog;
use crate::metrics::MetricsCollector;
use crate::tracer::{AgentTracer, Attributes};
use serde_json::json;
use std::fmt;
use std::time::Instant;

/// Time `call` and record it against `agent_name`
///
/// On failure the error is also recorded before being returned.
pub fn instrument<T, E, F>(metrics: &MetricsCollector, agent_name: &str, call: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let outcome = call();
    let duration = start.elapsed().as_secs_f64();

    match &outcome {
        Ok(_) => metrics.record_agent_call(agent_name, duration, true),
        Err(e) => {
            metrics.record_agent_call(agent_name, duration, false);
            metrics.record_error(agent_name, e);
        }
    }

    outcome
}

/// The observability collaborators an agent reports to
///
/// Built once by the application and passed to agents by reference. Only
/// the metrics collector is mandatory.
#[derive(Debug, Clone, Copy)]
pub struct Instrumentation<'a> {
    metrics: &'a MetricsCollector,
    tracer: Option<&'a AgentTracer>,
    activity: Option<&'a ActivityLog>,
}

impl<'a> Instrumentation<'a> {
    pub fn new(metrics: &'a MetricsCollector) -> Self {
        Self {
            metrics,
            tracer: None,
            activity: None,
        }
    }

    pub fn with_tracer(mut self, tracer: &'a AgentTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_activity_log(mut self, activity: &'a ActivityLog) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn metrics(&self) -> &'a MetricsCollector {
        self.metrics
    }

    /// Run `call` as `operation` of `agent_name`
    ///
    /// Opens a trace with one execution span when a tracer is attached and
    /// closes both with the call's result or error. The trace is addressed by
    /// its ID, so nested runs and runs on other threads keep their own traces.
    pub fn run<T, E, F>(&self, agent_name: &str, operation: &str, call: F) -> Result<T, E>
    where
        T: fmt::Debug,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let traced = self.tracer.map(|tracer| {
            let mut metadata = Attributes::new();
            metadata.insert("agent".to_string(), json!(agent_name));
            let trace_id = tracer.start_trace(operation, Some(metadata));
            let span = tracer.add_span_to(&trace_id, "operation_execution", agent_name, None);
            (tracer, trace_id, span)
        });

        let outcome = instrument(self.metrics, agent_name, call);

        if let Some((tracer, trace_id, span)) = traced {
            let (result, error) = match &outcome {
                Ok(value) => (Some(format!("{value:?}")), None),
                Err(e) => (None, Some(e.to_string())),
            };
            if let Some(span) = span {
                tracer.end_span_in(&trace_id, span, result.as_deref(), error.as_deref());
            }
            tracer.finish_trace(&trace_id, result.as_deref(), error.as_deref());
        }

        if let Some(activity) = self.activity {
            match &outcome {
                Ok(_) => activity.log_agent_activity(agent_name, operation, None),
                Err(e) => {
                    let mut context = Attributes::new();
                    context.insert("operation".to_string(), json!(operation));
                    activity.log_error(agent_name, e, Some(context));
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::Trace;
    use std::num::ParseIntError;
    use tempfile::tempdir;

    fn parse(input: &str) -> Result<u32, ParseIntError> {
        input.parse()
    }

    #[test]
    fn test_success_passes_through() {
        let metrics = MetricsCollector::new();
        let value = instrument(&metrics, "tutor", || parse("42")).unwrap();
        assert_eq!(value, 42);

        let stats = metrics.agent_stats("tutor").unwrap();
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.successful_calls, 1);
        assert!(metrics.get_metrics_report().recent_errors.is_empty());
    }

    #[test]
    fn test_failure_is_returned_unchanged() {
        let metrics = MetricsCollector::new();
        let expected = parse("nope").unwrap_err();
        let err = instrument(&metrics, "tutor", || parse("nope")).unwrap_err();
        assert_eq!(err, expected);

        let report = metrics.get_metrics_report();
        assert_eq!(report.overall.total_queries, 1);
        assert_eq!(report.overall.successful_queries, 0);
        assert_eq!(report.recent_errors.len(), 1);
        assert_eq!(report.recent_errors[0].error_type, "ParseIntError");
    }

    #[test]
    fn test_traced_run() {
        let dir = tempdir().unwrap();
        let metrics = MetricsCollector::new();
        let tracer = AgentTracer::new(dir.path().join("traces"));
        let activity = ActivityLog::new(dir.path().join("agent_logs.json"), 100);
        let instrumentation = Instrumentation::new(&metrics)
            .with_tracer(&tracer)
            .with_activity_log(&activity);

        let ok = instrumentation.run("AssessmentAgent", "evaluate", || parse("7"));
        assert_eq!(ok.unwrap(), 7);
        let err = instrumentation.run("AssessmentAgent", "evaluate", || parse("x"));
        assert!(err.is_err());

        assert!(tracer.current_trace_id().is_none());
        let traces = std::fs::read_dir(tracer.traces_dir()).unwrap().count();
        assert_eq!(traces, 2);

        let entries = activity.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].activity, "evaluate");
        assert_eq!(entries[1].context["operation"], "evaluate");

        assert_eq!(metrics.agent_stats("AssessmentAgent").unwrap().total_calls, 2);
    }

    #[test]
    fn test_nested_and_concurrent_runs_keep_their_traces() {
        let dir = tempdir().unwrap();
        let metrics = MetricsCollector::new();
        let tracer = AgentTracer::new(dir.path().join("traces"));
        let instrumentation = Instrumentation::new(&metrics).with_tracer(&tracer);

        let outer = instrumentation.run("main", "assist", || {
            instrumentation.run("AssessmentAgent", "evaluate", || parse("3"))
        });
        assert_eq!(outer.unwrap(), 3);

        std::thread::scope(|scope| {
            for i in 0..4 {
                let instrumentation = instrumentation;
                scope.spawn(move || {
                    let value = instrumentation.run("tutor", "assist", || parse(&i.to_string()));
                    assert_eq!(value.unwrap(), i);
                });
            }
        });

        assert!(tracer.current_trace_id().is_none());
        let traces: Vec<Trace> = std::fs::read_dir(tracer.traces_dir())
            .unwrap()
            .map(|entry| {
                let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
                serde_json::from_str(&content).unwrap()
            })
            .collect();
        assert_eq!(traces.len(), 6);
        for trace in &traces {
            assert_eq!(trace.spans.len(), 1);
            assert_eq!(trace.spans[0].agent, trace.metadata["agent"]);
            assert!(trace.spans[0].end_time.is_some());
            assert!(trace.error.is_none());
        }
    }
}
