use crate::application::schedule::ScheduleBook;
use crate::infrastructure::error::CoreError;
use crate::infrastructure::event_mapper::lessons_from_events;
use crate::infrastructure::graph_calendar_client::{CalendarClient, FetchWindow};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Events returned by the source for the window.
    pub fetched: usize,
    /// Lessons actually added to the schedule.
    pub imported: usize,
    /// Events dropped during normalization (no usable time range).
    pub skipped: usize,
}

/// One-shot calendar import: fetch the window, normalize events into
/// lessons, and add them to the schedule with id dedup. There is no
/// automatic retry; a failed fetch leaves the schedule untouched.
pub struct CalendarImportService<C>
where
    C: CalendarClient,
{
    calendar_client: Arc<C>,
}

impl<C> CalendarImportService<C>
where
    C: CalendarClient,
{
    pub fn new(calendar_client: Arc<C>) -> Self {
        Self { calendar_client }
    }

    pub async fn import_into(
        &self,
        schedule: &mut ScheduleBook,
        access_token: &str,
        window: FetchWindow,
    ) -> Result<ImportOutcome, CoreError> {
        let events = self
            .calendar_client
            .list_events(access_token, window)
            .await?;
        let fetched = events.len();
        let (lessons, skipped) = lessons_from_events(&events);
        let imported = schedule.import_lessons(lessons);
        Ok(ImportOutcome {
            fetched,
            imported,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::graph_calendar_client::CalendarEvent;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum FakeListResponse {
        Success(Vec<CalendarEvent>),
        AuthExpired,
        NetworkError,
    }

    #[derive(Debug)]
    struct FakeCalendarClient {
        response: Mutex<FakeListResponse>,
    }

    impl FakeCalendarClient {
        fn with_response(response: FakeListResponse) -> Self {
            Self {
                response: Mutex::new(response),
            }
        }
    }

    #[async_trait]
    impl CalendarClient for FakeCalendarClient {
        async fn list_events(
            &self,
            _access_token: &str,
            _window: FetchWindow,
        ) -> Result<Vec<CalendarEvent>, CoreError> {
            match self.response.lock().expect("response lock poisoned").clone() {
                FakeListResponse::Success(events) => Ok(events),
                FakeListResponse::AuthExpired => Err(CoreError::CalendarAuthExpired),
                FakeListResponse::NetworkError => {
                    Err(CoreError::Calendar("request failed: connection reset".to_string()))
                }
            }
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn window() -> FetchWindow {
        FetchWindow {
            start: fixed_time("2026-03-01T00:00:00Z"),
            end: fixed_time("2026-03-08T00:00:00Z"),
            timezone: "UTC".to_string(),
        }
    }

    fn event(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            external_id: id.to_string(),
            subject: format!("Event {id}"),
            body_preview: String::new(),
            start_at: fixed_time(start),
            end_at: fixed_time(end),
            location: None,
            importance: None,
            busy_status: None,
            is_recurring: false,
            series_id: None,
        }
    }

    #[tokio::test]
    async fn import_adds_new_lessons_and_skips_known_ids() {
        let client = Arc::new(FakeCalendarClient::with_response(FakeListResponse::Success(vec![
            event("evt-1", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z"),
            event("evt-2", "2026-03-02T11:00:00Z", "2026-03-02T12:00:00Z"),
        ])));
        let service = CalendarImportService::new(client);

        let mut schedule = ScheduleBook::new();
        schedule.import_lessons(vec![crate::domain::models::Lesson {
            id: "evt-1".to_string(),
            title: "Already here".to_string(),
            description: String::new(),
            start_at: fixed_time("2026-03-02T09:00:00Z"),
            end_at: fixed_time("2026-03-02T10:00:00Z"),
            is_recurring: false,
            series_id: None,
        }]);

        let outcome = service
            .import_into(&mut schedule, "token", window())
            .await
            .expect("import succeeds");

        assert_eq!(
            outcome,
            ImportOutcome {
                fetched: 2,
                imported: 1,
                skipped: 0,
            }
        );
        assert_eq!(schedule.lessons().len(), 2);
        assert_eq!(
            schedule.lesson_by_id("evt-1").expect("existing lesson").title,
            "Already here"
        );
    }

    #[tokio::test]
    async fn degenerate_events_are_counted_as_skipped() {
        let client = Arc::new(FakeCalendarClient::with_response(FakeListResponse::Success(vec![
            event("evt-1", "2026-03-02T09:00:00Z", "2026-03-02T10:00:00Z"),
            event("evt-2", "2026-03-02T11:00:00Z", "2026-03-02T11:00:00Z"),
        ])));
        let service = CalendarImportService::new(client);
        let mut schedule = ScheduleBook::new();

        let outcome = service
            .import_into(&mut schedule, "token", window())
            .await
            .expect("import succeeds");
        assert_eq!(
            outcome,
            ImportOutcome {
                fetched: 2,
                imported: 1,
                skipped: 1,
            }
        );
    }

    #[tokio::test]
    async fn failed_fetch_leaves_the_schedule_untouched() {
        let client = Arc::new(FakeCalendarClient::with_response(
            FakeListResponse::NetworkError,
        ));
        let service = CalendarImportService::new(client);
        let mut schedule = ScheduleBook::new();
        schedule.import_lessons(vec![crate::domain::models::Lesson {
            id: "existing".to_string(),
            title: "Existing".to_string(),
            description: String::new(),
            start_at: fixed_time("2026-03-02T09:00:00Z"),
            end_at: fixed_time("2026-03-02T10:00:00Z"),
            is_recurring: false,
            series_id: None,
        }]);

        let result = service.import_into(&mut schedule, "token", window()).await;
        assert!(matches!(result, Err(CoreError::Calendar(_))));
        assert_eq!(schedule.lessons().len(), 1);
    }

    #[tokio::test]
    async fn expired_authorization_is_surfaced_distinctly() {
        let client = Arc::new(FakeCalendarClient::with_response(
            FakeListResponse::AuthExpired,
        ));
        let service = CalendarImportService::new(client);
        let mut schedule = ScheduleBook::new();

        let result = service.import_into(&mut schedule, "token", window()).await;
        assert!(matches!(result, Err(CoreError::CalendarAuthExpired)));
    }
}
