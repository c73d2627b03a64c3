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

//! EduMentor observability
//!
//! Metrics, traces and structured activity logs for the tutoring agents.
//! Nothing here is a global: the application builds one of each collector
//! and hands references to [`Instrumentation`].

pub mod activity_log;
pub mod config;
pub mod error;
mod export;
pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod tracer;

pub use activity_log::{ActivityEntry, ActivityLevel, ActivityLog};
pub use config::ObservabilityConfig;
pub use error::{ObservabilityError, ObservabilityResult};
pub use instrument::{instrument, Instrumentation};
pub use metrics::{
    AgentCallStats, AgentPerformance, ErrorRecord, MetricsCollector, MetricsReport, OverallMetrics,
};
pub use tracer::{AgentTracer, Attributes, Span, Trace};
