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

//! Agent call metrics
//!
//! Per-agent call counters and durations plus global success figures,
//! aggregated into a report for dashboards and the metrics file.

use crate::error::ObservabilityResult;
use crate::export::{short_type_name, write_json};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Errors surfaced in a report
pub const RECENT_ERRORS_IN_REPORT: usize = 5;

/// Default bound on stored errors
pub const DEFAULT_MAX_ERRORS: usize = 1_000;

/// Running totals for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentCallStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    /// Seconds
    pub total_duration: f64,
    /// `total_duration / total_calls`
    pub avg_duration: f64,
}

/// One recorded agent failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub error: String,
    pub error_type: String,
}

/// Global figures of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub total_queries: u64,
    pub successful_queries: u64,
    /// Percent, two decimals
    pub success_rate: f64,
    /// Seconds over successful calls only, three decimals
    pub avg_response_time: f64,
    pub total_errors: u64,
}

/// Per-agent figures of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub call_count: u64,
    /// Percent
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub total_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub timestamp: DateTime<Utc>,
    pub overall: OverallMetrics,
    pub agent_performance: BTreeMap<String, AgentPerformance>,
    pub recent_errors: Vec<ErrorRecord>,
}

#[derive(Debug, Default)]
struct MetricsState {
    agent_calls: BTreeMap<String, AgentCallStats>,
    /// Durations of successful calls
    response_times: Vec<f64>,
    errors: VecDeque<ErrorRecord>,
    total_errors: u64,
    total_queries: u64,
    successful_queries: u64,
    success_rate: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Collector of agent call outcomes
///
/// One instance lives for the whole process and is shared by reference with
/// whatever instruments agent calls.
#[derive(Debug)]
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
    max_errors: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_max_errors(DEFAULT_MAX_ERRORS)
    }

    /// Collector keeping at most `max_errors` error records
    ///
    /// The error total in reports still counts every error.
    pub fn with_max_errors(max_errors: usize) -> Self {
        Self {
            state: Mutex::new(MetricsState::default()),
            max_errors,
        }
    }

    /// Record one agent call of `duration` seconds
    pub fn record_agent_call(&self, agent_name: &str, duration: f64, success: bool) {
        let mut state = self.state.lock();

        let agent = state.agent_calls.entry(agent_name.to_string()).or_default();
        agent.total_calls += 1;
        agent.total_duration += duration;
        if success {
            agent.successful_calls += 1;
        }
        agent.avg_duration = agent.total_duration / agent.total_calls as f64;

        state.total_queries += 1;
        if success {
            state.successful_queries += 1;
            state.response_times.push(duration);
        }
        state.success_rate = state.successful_queries as f64 / state.total_queries as f64 * 100.0;

        debug!(agent = agent_name, duration, success, "agent call recorded");
    }

    /// Record an agent failure; the error kind is the error's type name
    pub fn record_error<E: fmt::Display + ?Sized>(&self, agent_name: &str, error: &E) {
        self.record_error_kind(agent_name, short_type_name::<E>(), error);
    }

    /// Record an agent failure under an explicit kind
    pub fn record_error_kind<E: fmt::Display + ?Sized>(
        &self,
        agent_name: &str,
        error_type: &str,
        error: &E,
    ) {
        let mut state = self.state.lock();
        state.errors.push_back(ErrorRecord {
            timestamp: Utc::now(),
            agent: agent_name.to_string(),
            error: error.to_string(),
            error_type: error_type.to_string(),
        });
        state.total_errors += 1;

        while state.errors.len() > self.max_errors {
            state.errors.pop_front();
        }
    }

    /// Running totals for one agent, if it was ever called
    pub fn agent_stats(&self, agent_name: &str) -> Option<AgentCallStats> {
        self.state.lock().agent_calls.get(agent_name).cloned()
    }

    pub fn get_metrics_report(&self) -> MetricsReport {
        let state = self.state.lock();

        let avg_response_time = if state.response_times.is_empty() {
            0.0
        } else {
            state.response_times.iter().sum::<f64>() / state.response_times.len() as f64
        };

        let agent_performance = state
            .agent_calls
            .iter()
            .map(|(name, stats)| {
                let performance = AgentPerformance {
                    call_count: stats.total_calls,
                    success_rate: stats.successful_calls as f64 / stats.total_calls as f64 * 100.0,
                    avg_response_time: stats.avg_duration,
                    total_duration: stats.total_duration,
                };
                (name.clone(), performance)
            })
            .collect();

        let skip = state.errors.len().saturating_sub(RECENT_ERRORS_IN_REPORT);
        let recent_errors = state.errors.iter().skip(skip).cloned().collect();

        MetricsReport {
            timestamp: Utc::now(),
            overall: OverallMetrics {
                total_queries: state.total_queries,
                successful_queries: state.successful_queries,
                success_rate: round_to(state.success_rate, 2),
                avg_response_time: round_to(avg_response_time, 3),
                total_errors: state.total_errors,
            },
            agent_performance,
            recent_errors,
        }
    }

    /// Write the current report to `path` and return it
    pub fn save_metrics(&self, path: impl AsRef<Path>) -> ObservabilityResult<MetricsReport> {
        let report = self.get_metrics_report();
        write_json(path.as_ref(), &report)?;
        Ok(report)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
