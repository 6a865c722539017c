use crate::domain::models::{Activity, ActivityKind, FocusSession};
use crate::infrastructure::error::CoreError;
use chrono::{DateTime, Utc};

/// A zero-interruption session earns its minutes twice.
pub fn focus_points(focus_minutes: i64, interruption_count: u32) -> i64 {
    if interruption_count == 0 {
        focus_minutes * 2
    } else {
        focus_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSessionSummary {
    pub focus_minutes: i64,
    pub focus_points: i64,
    pub session: FocusSession,
}

/// Focus session state machine: Idle -> Active -> Idle. Completed sessions
/// are archived append-only and never revisited.
#[derive(Debug, Clone)]
pub struct FocusTracker {
    focus_target_seconds: i64,
    active: Option<FocusSession>,
    history: Vec<FocusSession>,
}

impl FocusTracker {
    pub fn new(focus_target_minutes: u32) -> Self {
        Self::from_history(focus_target_minutes, Vec::new())
    }

    pub fn from_history(focus_target_minutes: u32, history: Vec<FocusSession>) -> Self {
        Self {
            focus_target_seconds: focus_target_minutes.max(1) as i64 * 60,
            active: None,
            history,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_session(&self) -> Option<&FocusSession> {
        self.active.as_ref()
    }

    pub fn history(&self) -> &[FocusSession] {
        &self.history
    }

    pub fn start_session(
        &mut self,
        id: String,
        now: DateTime<Utc>,
    ) -> Result<&FocusSession, CoreError> {
        if self.active.is_some() {
            return Err(CoreError::InvalidState(
                "a focus session is already active".to_string(),
            ));
        }

        self.active = Some(FocusSession {
            id,
            start_at: now,
            end_at: None,
            duration_seconds: 0,
            interruption_count: 0,
            activities: Vec::new(),
        });
        Ok(self.active.as_ref().expect("session was just set"))
    }

    /// Appends to the active session's activity log; a no-op while Idle.
    pub fn record_activity(
        &mut self,
        id: String,
        kind: ActivityKind,
        details: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };

        active.activities.push(Activity {
            id,
            timestamp: now,
            kind,
            details: details.trim().to_string(),
        });
        if kind.counts_as_interruption() {
            active.interruption_count += 1;
        }
        true
    }

    /// Advisory display value; the final duration is fixed at stop time.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(active) = self.active.as_mut() {
            active.duration_seconds = (now - active.start_at).num_seconds().max(0);
        }
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        match self.active.as_ref() {
            Some(active) => {
                let elapsed = (now - active.start_at).num_seconds().max(0);
                (self.focus_target_seconds - elapsed).max(0)
            }
            None => 0,
        }
    }

    pub fn stop_session(&mut self, now: DateTime<Utc>) -> Result<CompletedSessionSummary, CoreError> {
        let Some(mut session) = self.active.take() else {
            return Err(CoreError::InvalidState(
                "no focus session is active".to_string(),
            ));
        };

        session.end_at = Some(now);
        session.duration_seconds = (now - session.start_at).num_seconds().max(0);
        let focus_minutes = session.duration_seconds / 60;
        let summary = CompletedSessionSummary {
            focus_minutes,
            focus_points: focus_points(focus_minutes, session.interruption_count),
            session: session.clone(),
        };
        self.history.push(session);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn start() -> DateTime<Utc> {
        fixed_time("2026-03-02T15:00:00Z")
    }

    #[test]
    fn starting_while_active_is_an_invalid_state() {
        let mut tracker = FocusTracker::new(25);
        tracker
            .start_session("ses-1".to_string(), start())
            .expect("first start");
        assert!(matches!(
            tracker.start_session("ses-2".to_string(), start()),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn stopping_while_idle_is_an_invalid_state() {
        let mut tracker = FocusTracker::new(25);
        assert!(matches!(
            tracker.stop_session(start()),
            Err(CoreError::InvalidState(_))
        ));
    }

    #[test]
    fn interrupted_session_earns_single_minutes() {
        let mut tracker = FocusTracker::new(25);
        tracker
            .start_session("ses-1".to_string(), start())
            .expect("start session");
        assert!(tracker.record_activity(
            "act-1".to_string(),
            ActivityKind::TabSwitch,
            "switched tab",
            start() + Duration::seconds(5),
        ));
        assert!(tracker.record_activity(
            "act-2".to_string(),
            ActivityKind::Return,
            "came back",
            start() + Duration::seconds(6),
        ));

        let summary = tracker
            .stop_session(start() + Duration::seconds(600))
            .expect("stop session");
        assert_eq!(summary.session.interruption_count, 1);
        assert_eq!(summary.session.duration_seconds, 600);
        assert_eq!(summary.focus_minutes, 10);
        assert_eq!(summary.focus_points, 10);
        assert_eq!(tracker.history().len(), 1);
        assert!(!tracker.is_active());
    }

    #[test]
    fn clean_session_earns_double_minutes() {
        let mut tracker = FocusTracker::new(25);
        tracker
            .start_session("ses-1".to_string(), start())
            .expect("start session");
        let summary = tracker
            .stop_session(start() + Duration::minutes(10))
            .expect("stop session");
        assert_eq!(summary.focus_points, 20);
    }

    #[test]
    fn only_leave_and_tab_switch_count_as_interruptions() {
        let mut tracker = FocusTracker::new(25);
        tracker
            .start_session("ses-1".to_string(), start())
            .expect("start session");
        tracker.record_activity("act-1".to_string(), ActivityKind::WindowFocus, "", start());
        tracker.record_activity("act-2".to_string(), ActivityKind::Return, "", start());
        tracker.record_activity("act-3".to_string(), ActivityKind::Leave, "", start());

        let active = tracker.active_session().expect("active session");
        assert_eq!(active.interruption_count, 1);
        assert_eq!(active.activities.len(), 3);
    }

    #[test]
    fn record_activity_while_idle_is_a_no_op() {
        let mut tracker = FocusTracker::new(25);
        assert!(!tracker.record_activity(
            "act-1".to_string(),
            ActivityKind::Leave,
            "",
            start()
        ));
    }

    #[test]
    fn tick_updates_advisory_duration_and_remaining() {
        let mut tracker = FocusTracker::new(25);
        tracker
            .start_session("ses-1".to_string(), start())
            .expect("start session");

        tracker.tick(start() + Duration::seconds(90));
        assert_eq!(
            tracker.active_session().expect("active").duration_seconds,
            90
        );
        assert_eq!(
            tracker.remaining_seconds(start() + Duration::seconds(90)),
            25 * 60 - 90
        );
        assert_eq!(
            tracker.remaining_seconds(start() + Duration::minutes(30)),
            0
        );

        tracker.tick(start() - Duration::seconds(5));
        assert_eq!(tracker.active_session().expect("active").duration_seconds, 0);
    }

    #[test]
    fn focus_point_rule_doubles_only_clean_sessions() {
        assert_eq!(focus_points(10, 0), 20);
        assert_eq!(focus_points(10, 1), 10);
        assert_eq!(focus_points(10, 7), 10);
        assert_eq!(focus_points(0, 0), 0);
    }
}
