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

use edumentor_observability::{instrument, MetricsCollector};
use proptest::prelude::*;
use std::fmt;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn agent_average_is_total_over_calls(
        calls in prop::collection::vec((0.0f64..30.0, any::<bool>()), 1..40)
    ) {
        let metrics = MetricsCollector::new();
        for (duration, success) in &calls {
            metrics.record_agent_call("tutor", *duration, *success);
        }

        let stats = metrics.agent_stats("tutor").unwrap();
        let total: f64 = calls.iter().map(|(d, _)| d).sum();
        prop_assert_eq!(stats.total_calls, calls.len() as u64);
        prop_assert!(stats.successful_calls <= stats.total_calls);
        prop_assert!(close(stats.total_duration, total));
        prop_assert!(close(stats.avg_duration, total / calls.len() as f64));
    }

    #[test]
    fn overall_success_rate_matches_counts(
        outcomes in prop::collection::vec(any::<bool>(), 1..60)
    ) {
        let metrics = MetricsCollector::new();
        for (i, success) in outcomes.iter().enumerate() {
            let agent = if i % 2 == 0 { "tutor" } else { "assessor" };
            metrics.record_agent_call(agent, 1.0, *success);
        }

        let overall = metrics.get_metrics_report().overall;
        let successes = outcomes.iter().filter(|s| **s).count() as u64;
        prop_assert_eq!(overall.total_queries, outcomes.len() as u64);
        prop_assert_eq!(overall.successful_queries, successes);

        let expected = successes as f64 / outcomes.len() as f64 * 100.0;
        prop_assert!((overall.success_rate - expected).abs() <= 0.005 + 1e-9);
        prop_assert!((0.0..=100.0).contains(&overall.success_rate));
    }
}

#[derive(Debug, PartialEq)]
struct UpstreamUnavailable {
    retry_after: u32,
}

impl fmt::Display for UpstreamUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream unavailable, retry in {}s", self.retry_after)
    }
}

#[test]
fn instrumented_failure_reaches_caller_and_report() {
    let metrics = MetricsCollector::new();

    let outcome: Result<String, UpstreamUnavailable> =
        instrument(&metrics, "main", || Err(UpstreamUnavailable { retry_after: 5 }));
    assert_eq!(outcome, Err(UpstreamUnavailable { retry_after: 5 }));

    let report = metrics.get_metrics_report();
    assert_eq!(report.overall.total_errors, 1);
    assert_eq!(report.agent_performance["main"].success_rate, 0.0);

    let error = &report.recent_errors[0];
    assert_eq!(error.agent, "main");
    assert_eq!(error.error_type, "UpstreamUnavailable");
    assert_eq!(error.error, "upstream unavailable, retry in 5s");
}
