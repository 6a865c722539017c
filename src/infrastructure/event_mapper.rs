use crate::domain::models::Lesson;
use crate::infrastructure::graph_calendar_client::CalendarEvent;

const UNTITLED_SUBJECT: &str = "Untitled event";

/// Normalizes one external event into a Lesson. Events without a usable
/// time range are dropped rather than surfaced as errors; a fetch is not
/// invalidated by one bad row.
pub fn lesson_from_event(event: &CalendarEvent) -> Option<Lesson> {
    if event.end_at <= event.start_at {
        return None;
    }

    let title = {
        let trimmed = event.subject.trim();
        if trimmed.is_empty() {
            UNTITLED_SUBJECT.to_string()
        } else {
            trimmed.to_string()
        }
    };

    let mut description = event.body_preview.trim().to_string();
    if let Some(location) = event.location.as_deref().map(str::trim).filter(|value| !value.is_empty())
    {
        if description.is_empty() {
            description = location.to_string();
        } else {
            description = format!("{description} ({location})");
        }
    }

    Some(Lesson {
        id: event.external_id.clone(),
        title,
        description,
        start_at: event.start_at,
        end_at: event.end_at,
        is_recurring: event.is_recurring,
        series_id: event.series_id.clone(),
    })
}

pub fn lessons_from_events(events: &[CalendarEvent]) -> (Vec<Lesson>, usize) {
    let mut lessons = Vec::with_capacity(events.len());
    let mut skipped = 0;
    for event in events {
        match lesson_from_event(event) {
            Some(lesson) => lessons.push(lesson),
            None => skipped += 1,
        }
    }
    (lessons, skipped)
}
