use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoodState {
    Focused,
    Bored,
    Stressed,
    Neutral,
}

impl MoodState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Focused => "focused",
            Self::Bored => "bored",
            Self::Stressed => "stressed",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Leave,
    Return,
    TabSwitch,
    WindowFocus,
}

impl ActivityKind {
    /// Leaving the page and switching tabs count against the session;
    /// coming back does not.
    pub fn counts_as_interruption(self) -> bool {
        matches!(self, Self::Leave | Self::TabSwitch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_recurring: bool,
    pub series_id: Option<String>,
}

impl Lesson {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "lesson.id")?;
        validate_non_empty(&self.title, "lesson.title")?;
        if self.end_at <= self.start_at {
            return Err("lesson.end_at must be after lesson.start_at".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    pub id: String,
    pub date_key: String,
    pub mood: String,
    pub state: MoodState,
    pub lesson_id: String,
    pub note: String,
}

impl MoodEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "mood.id")?;
        validate_non_empty(&self.mood, "mood.mood")?;
        validate_non_empty(&self.lesson_id, "mood.lesson_id")?;
        validate_date(&self.date_key, "mood.date_key")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocusSession {
    pub id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub interruption_count: u32,
    pub activities: Vec<Activity>,
}

impl FocusSession {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "session.id")?;
        if let Some(end_at) = self.end_at {
            if end_at < self.start_at {
                return Err("session.end_at must be >= session.start_at".to_string());
            }
        }
        if self.duration_seconds < 0 {
            return Err("session.duration_seconds must be >= 0".to_string());
        }
        Ok(())
    }
}

/// The single point ledger for the signed-in user. Category buckets and the
/// total are always written together, so `total_points` stays equal to the
/// sum of the three buckets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardStats {
    pub total_points: i64,
    pub points_this_week: i64,
    pub completed_lesson_ids: Vec<String>,
    pub game_points: i64,
    pub focus_points: i64,
    pub mood_points: i64,
    pub last_updated: DateTime<Utc>,
}

impl RewardStats {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_points: 0,
            points_this_week: 0,
            completed_lesson_ids: Vec::new(),
            game_points: 0,
            focus_points: 0,
            mood_points: 0,
            last_updated: now,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total_points == self.game_points + self.focus_points + self.mood_points
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl UserIdentity {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "identity.id")?;
        validate_non_empty(&self.email, "identity.email")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl ProviderToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + chrono::Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
