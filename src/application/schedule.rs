use crate::domain::models::{parse_hhmm, Lesson};
use crate::infrastructure::error::CoreError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashSet;

const SINGLE_LESSON_HOURS: i64 = 1;
const DOUBLE_LESSON_HOURS: i64 = 2;

/// Week windows start on Sunday: day 0 of the window is
/// `today - days_from_sunday(today)`, shifted by whole weeks.
pub fn week_window(today: NaiveDate, week_offset: i32) -> (NaiveDate, NaiveDate) {
    let start = today - Duration::days(today.weekday().num_days_from_sunday() as i64)
        + Duration::weeks(week_offset as i64);
    (start, start + Duration::days(6))
}

/// Owns the lesson list and answers the temporal queries over it.
#[derive(Debug, Default, Clone)]
pub struct ScheduleBook {
    lessons: Vec<Lesson>,
}

impl ScheduleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lessons(lessons: Vec<Lesson>) -> Self {
        Self { lessons }
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn lesson_by_id(&self, lesson_id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.id == lesson_id)
    }

    pub fn add_lesson(
        &mut self,
        id: String,
        date: NaiveDate,
        title: &str,
        time: &str,
        description: &str,
        is_double_lesson: bool,
    ) -> Result<Lesson, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::Validation("title must not be empty".to_string()));
        }
        if time.trim().is_empty() {
            return Err(CoreError::Validation("time must not be empty".to_string()));
        }
        let start_time = parse_hhmm(time)
            .ok_or_else(|| CoreError::Validation("time must be HH:MM".to_string()))?;

        let start_at = Utc.from_utc_datetime(&date.and_time(start_time));
        let duration_hours = if is_double_lesson {
            DOUBLE_LESSON_HOURS
        } else {
            SINGLE_LESSON_HOURS
        };
        let lesson = Lesson {
            id,
            title: title.to_string(),
            description: description.trim().to_string(),
            start_at,
            end_at: start_at + Duration::hours(duration_hours),
            is_recurring: false,
            series_id: None,
        };
        lesson.validate().map_err(CoreError::Validation)?;

        self.lessons.push(lesson.clone());
        Ok(lesson)
    }

    /// Removing an unknown id is not an error.
    pub fn delete_lesson(&mut self, lesson_id: &str) -> bool {
        let before = self.lessons.len();
        self.lessons.retain(|lesson| lesson.id != lesson_id);
        self.lessons.len() != before
    }

    pub fn lessons_for_day(&self, date: NaiveDate) -> Vec<Lesson> {
        let mut lessons = self
            .lessons
            .iter()
            .filter(|lesson| lesson.start_at.date_naive() == date)
            .cloned()
            .collect::<Vec<_>>();
        lessons.sort_by(|left, right| left.start_at.cmp(&right.start_at));
        lessons
    }

    /// Always yields exactly 7 day buckets, empty ones included.
    pub fn lessons_for_week(
        &self,
        today: NaiveDate,
        week_offset: i32,
    ) -> Vec<(NaiveDate, Vec<Lesson>)> {
        let (week_start, _) = week_window(today, week_offset);
        (0..7)
            .map(|offset| {
                let day = week_start + Duration::days(offset);
                (day, self.lessons_for_day(day))
            })
            .collect()
    }

    /// Both bounds are inclusive, so an instant equal to one lesson's end
    /// and the next one's start matches both; the earlier lesson wins.
    pub fn current_lesson(&self, now: DateTime<Utc>) -> Option<Lesson> {
        let mut lessons = self.lessons.iter().collect::<Vec<_>>();
        lessons.sort_by(|left, right| left.start_at.cmp(&right.start_at));
        lessons
            .into_iter()
            .find(|lesson| lesson.start_at <= now && now <= lesson.end_at)
            .cloned()
    }

    pub fn upcoming_lessons(&self, now: DateTime<Utc>) -> Vec<Lesson> {
        let mut lessons = self
            .lessons
            .iter()
            .filter(|lesson| lesson.start_at > now)
            .cloned()
            .collect::<Vec<_>>();
        lessons.sort_by(|left, right| left.start_at.cmp(&right.start_at));
        lessons
    }

    /// Imports externally sourced lessons, deduplicating by id. Lessons
    /// already present keep their stored version.
    pub fn import_lessons(&mut self, incoming: Vec<Lesson>) -> usize {
        let mut known = self
            .lessons
            .iter()
            .map(|lesson| lesson.id.clone())
            .collect::<HashSet<_>>();
        let mut imported = 0;
        for lesson in incoming {
            if known.insert(lesson.id.clone()) {
                self.lessons.push(lesson);
                imported += 1;
            }
        }
        imported
    }
}
