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

//! Invariant checks over arbitrary interaction histories

use chrono::{Duration, TimeZone, Utc};
use edumentor_memory::{detect_subject, Session, SessionManager};
use proptest::prelude::*;
use tempfile::tempdir;

fn query_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Explain MATH homework".to_string()),
        Just("science fair ideas".to_string()),
        Just("history of Rome".to_string()),
        Just("programming in rust".to_string()),
        Just("a literature essay".to_string()),
        Just("math or science?".to_string()),
        "[a-zA-Z ]{0,40}",
    ]
}

proptest! {
    #[test]
    fn interaction_counters_stay_consistent(
        steps in prop::collection::vec((query_strategy(), 0i64..600), 0..40)
    ) {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let mut session = Session::new_at("S1", None, start);
        let mut now = start;

        for (query, gap) in &steps {
            now += Duration::seconds(*gap);
            session.add_interaction_at(query, "response", None, now);

            prop_assert_eq!(session.progress().questions_asked, session.interactions().len());
            prop_assert!(session.context().recent_topics.len() <= 10);
            prop_assert!(session.last_activity() >= session.created_at());
        }

        let tagged: Vec<&str> = steps.iter().filter_map(|(q, _)| detect_subject(q)).collect();
        let expected_tail = &tagged[tagged.len().saturating_sub(10)..];
        prop_assert_eq!(&session.context().recent_topics, &expected_tail.to_vec());
    }

    #[test]
    fn is_active_is_monotonic_in_timeout(idle_secs in 0i64..10_000, t in 0i64..200, extra in 0i64..200) {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let session = Session::new_at("S1", None, start);
        let now = start + Duration::seconds(idle_secs);

        if session.is_active_at(now, t) {
            prop_assert!(session.is_active_at(now, t + extra));
        }
    }

    #[test]
    fn cleanup_removes_exactly_the_idle_sessions(ages in prop::collection::vec(0i64..90, 0..12)) {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(dir.path().join("sessions.json"), 30);
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();

        let mut expected_removed = Vec::new();
        let mut expected_kept = Vec::new();
        for (i, age) in ages.iter().enumerate() {
            let student = format!("S{i}");
            let session = manager.create_session_at(&student, now - Duration::minutes(*age)).unwrap();
            if *age >= 30 {
                expected_removed.push(session.session_id().to_string());
            } else {
                expected_kept.push(session.session_id().to_string());
            }
        }

        let removed = manager.cleanup_inactive_at(now, 30);
        prop_assert_eq!(removed, expected_removed);
        prop_assert_eq!(manager.session_count(), expected_kept.len());
        for id in &expected_kept {
            prop_assert!(manager.get_session(id).is_some());
        }
    }
}

#[test]
fn first_vocabulary_subject_wins() {
    let mut session = Session::new("S1");
    session.add_interaction("math and science together", "...", None);
    assert_eq!(
        session.progress().subjects_studied.iter().collect::<Vec<_>>(),
        vec!["math"]
    );
}
