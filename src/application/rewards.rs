use crate::application::schedule::week_window;
use crate::domain::models::{Lesson, MoodEntry, MoodState, RewardStats};
use crate::infrastructure::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const MOOD_POINTS_PER_ENTRY: i64 = 1;
pub const GAME_SCORE_PER_POINT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoodBreakdown {
    pub focused: u32,
    pub bored: u32,
    pub stressed: u32,
    pub neutral: u32,
    pub total: u32,
}

impl MoodBreakdown {
    fn record(&mut self, state: MoodState) {
        match state {
            MoodState::Focused => self.focused += 1,
            MoodState::Bored => self.bored += 1,
            MoodState::Stressed => self.stressed += 1,
            MoodState::Neutral => self.neutral += 1,
        }
        self.total += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonMoodBreakdown {
    pub lesson_title: String,
    pub breakdown: MoodBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyMoodStats {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub overall: MoodBreakdown,
    pub per_lesson: Vec<LessonMoodBreakdown>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameCredit {
    pub points_earned: i64,
    pub high_score: i64,
    pub new_high_score: bool,
}

#[derive(Debug, Clone, Copy)]
enum PointBucket {
    Mood,
    Focus,
    Game,
}

/// Mood entries plus the single point ledger. Every credit path writes its
/// bucket and the total together, so the stats stay balanced.
#[derive(Debug, Clone)]
pub struct RewardLedger {
    entries: Vec<MoodEntry>,
    stats: RewardStats,
    high_score: i64,
}

impl RewardLedger {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::from_parts(Vec::new(), RewardStats::new(now), 0)
    }

    pub fn from_parts(entries: Vec<MoodEntry>, stats: RewardStats, high_score: i64) -> Self {
        Self {
            entries,
            stats,
            high_score,
        }
    }

    pub fn entries(&self) -> &[MoodEntry] {
        &self.entries
    }

    pub fn stats(&self) -> &RewardStats {
        &self.stats
    }

    pub fn high_score(&self) -> i64 {
        self.high_score
    }

    /// One mood entry per lesson per day; a second submission for the same
    /// pair is rejected and credits nothing.
    pub fn submit_mood(
        &mut self,
        lesson: &Lesson,
        id: String,
        mood: &str,
        state: MoodState,
        note: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<MoodEntry, CoreError> {
        let mood = mood.trim();
        if mood.is_empty() {
            return Err(CoreError::Validation("mood must not be empty".to_string()));
        }

        let date_key = today.format("%Y-%m-%d").to_string();
        if self
            .entries
            .iter()
            .any(|entry| entry.lesson_id == lesson.id && entry.date_key == date_key)
        {
            return Err(CoreError::DuplicateEntry(format!(
                "mood already recorded for lesson {} on {}",
                lesson.id, date_key
            )));
        }

        let entry = MoodEntry {
            id,
            date_key,
            mood: mood.to_string(),
            state,
            lesson_id: lesson.id.clone(),
            note: note.trim().to_string(),
        };
        self.entries.push(entry.clone());
        self.stats.completed_lesson_ids.push(lesson.id.clone());
        self.credit(PointBucket::Mood, MOOD_POINTS_PER_ENTRY, now);
        Ok(entry)
    }

    pub fn mood_stats(&self, lesson_id: &str) -> MoodBreakdown {
        let mut breakdown = MoodBreakdown::default();
        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.lesson_id == lesson_id)
        {
            breakdown.record(entry.state);
        }
        breakdown
    }

    /// Aggregates the week's entries overall and per lesson title. Entries
    /// whose lesson no longer exists are grouped under their lesson id.
    pub fn weekly_mood_stats(
        &self,
        lessons: &[Lesson],
        today: NaiveDate,
        week_offset: i32,
    ) -> WeeklyMoodStats {
        let (week_start, week_end) = week_window(today, week_offset);
        let titles_by_id = lessons
            .iter()
            .map(|lesson| (lesson.id.as_str(), lesson.title.as_str()))
            .collect::<HashMap<_, _>>();

        let mut overall = MoodBreakdown::default();
        let mut per_lesson: BTreeMap<String, MoodBreakdown> = BTreeMap::new();
        for entry in &self.entries {
            let Ok(date) = NaiveDate::parse_from_str(&entry.date_key, "%Y-%m-%d") else {
                continue;
            };
            if date < week_start || date > week_end {
                continue;
            }

            overall.record(entry.state);
            let title = titles_by_id
                .get(entry.lesson_id.as_str())
                .map(|title| (*title).to_string())
                .unwrap_or_else(|| entry.lesson_id.clone());
            per_lesson.entry(title).or_default().record(entry.state);
        }

        WeeklyMoodStats {
            week_start,
            week_end,
            overall,
            per_lesson: per_lesson
                .into_iter()
                .map(|(lesson_title, breakdown)| LessonMoodBreakdown {
                    lesson_title,
                    breakdown,
                })
                .collect(),
        }
    }

    /// Scores always credit their floored points; high-score tracking is an
    /// independent comparison against history.
    pub fn credit_game_score(&mut self, raw_score: i64, now: DateTime<Utc>) -> GameCredit {
        let points_earned = raw_score.max(0) / GAME_SCORE_PER_POINT;
        self.credit(PointBucket::Game, points_earned, now);

        let new_high_score = raw_score > self.high_score;
        if new_high_score {
            self.high_score = raw_score;
        }
        GameCredit {
            points_earned,
            high_score: self.high_score,
            new_high_score,
        }
    }

    pub fn credit_focus(&mut self, focus_points: i64, now: DateTime<Utc>) {
        self.credit(PointBucket::Focus, focus_points.max(0), now);
    }

    fn credit(&mut self, bucket: PointBucket, points: i64, now: DateTime<Utc>) {
        match bucket {
            PointBucket::Mood => self.stats.mood_points += points,
            PointBucket::Focus => self.stats.focus_points += points,
            PointBucket::Game => self.stats.game_points += points,
        }
        self.stats.total_points += points;
        self.stats.points_this_week += points;
        self.stats.last_updated = now;
        debug_assert!(self.stats.is_balanced());
    }
}
