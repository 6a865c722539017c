use crate::application::bootstrap::bootstrap_workspace;
use crate::application::calendar_import::CalendarImportService;
use crate::application::focus::FocusTracker;
use crate::application::identity::{EnsureTokenResult, IdentitySession};
use crate::application::minigame::{ClickOutcome, GamePhase, TargetGame, TargetPosition};
use crate::application::rewards::{MoodBreakdown, RewardLedger, WeeklyMoodStats};
use crate::application::schedule::ScheduleBook;
use crate::domain::models::{
    ActivityKind, FocusSession, Lesson, MoodEntry, MoodState, RewardStats, UserIdentity,
};
use crate::infrastructure::config::{
    read_break_minutes, read_focus_minutes, read_teacher_email_domains, read_timezone,
    read_weekly_points_goal,
};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::CoreError;
use crate::infrastructure::graph_calendar_client::{FetchWindow, ReqwestGraphCalendarClient};
use crate::infrastructure::identity_client::{
    PasswordCredentials, ProviderAssertion, ReqwestIdentityClient,
};
use crate::infrastructure::state_store::{
    SqliteStateStore, StateStore, KEY_FOCUS_SESSIONS, KEY_GAME_HIGH_SCORE, KEY_MOOD_ENTRIES,
    KEY_REWARD_STATS, KEY_SCHEDULE,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_IMPORT_WINDOW_DAYS: i64 = 7;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

type AppIdentitySession = IdentitySession<KeyringCredentialStore, ReqwestIdentityClient>;

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    focus_target_minutes: u32,
    state_store: Arc<SqliteStateStore>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, CoreError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");
        let focus_target_minutes = read_focus_minutes(&config_dir)?;
        let state_store = Arc::new(SqliteStateStore::new(&bootstrap.database_path));
        let runtime = hydrate_runtime(state_store.as_ref(), focus_target_minutes);

        Ok(Self {
            config_dir,
            database_path: bootstrap.database_path,
            logs_dir,
            focus_target_minutes,
            state_store,
            runtime: Mutex::new(runtime),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &CoreError) -> String {
        self.log_error(command, &error.to_string());
        error.user_message()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    /// Store failures are logged and never surfaced as domain errors.
    fn persist_state(&self, key: &str, value: serde_json::Value) {
        if let Err(error) = self.state_store.set(key, &value) {
            self.log_error("persist_state", &format!("failed to persist {key}: {error}"));
        }
    }

    fn persist_schedule(&self, runtime: &RuntimeState) {
        self.persist_state(KEY_SCHEDULE, serde_json::json!(runtime.schedule.lessons()));
    }

    fn persist_focus_sessions(&self, runtime: &RuntimeState) {
        self.persist_state(
            KEY_FOCUS_SESSIONS,
            serde_json::json!(runtime.focus.history()),
        );
    }

    fn persist_ledger(&self, runtime: &RuntimeState) {
        self.persist_state(
            KEY_MOOD_ENTRIES,
            serde_json::json!(runtime.ledger.entries()),
        );
        self.persist_state(KEY_REWARD_STATS, serde_json::json!(runtime.ledger.stats()));
        self.persist_state(
            KEY_GAME_HIGH_SCORE,
            serde_json::json!(runtime.ledger.high_score()),
        );
    }

    fn persist_all(&self, runtime: &RuntimeState) {
        self.persist_schedule(runtime);
        self.persist_focus_sessions(runtime);
        self.persist_ledger(runtime);
    }
}

struct RuntimeState {
    user: Option<UserIdentity>,
    schedule: ScheduleBook,
    focus: FocusTracker,
    ledger: RewardLedger,
    game: TargetGame,
}

fn hydrate_runtime(store: &SqliteStateStore, focus_target_minutes: u32) -> RuntimeState {
    let lessons: Vec<Lesson> = decode_state(store, KEY_SCHEDULE).unwrap_or_default();
    let entries: Vec<MoodEntry> = decode_state(store, KEY_MOOD_ENTRIES).unwrap_or_default();
    let sessions: Vec<FocusSession> = decode_state(store, KEY_FOCUS_SESSIONS).unwrap_or_default();
    let stats: RewardStats =
        decode_state(store, KEY_REWARD_STATS).unwrap_or_else(|| RewardStats::new(Utc::now()));
    let high_score: i64 = decode_state(store, KEY_GAME_HIGH_SCORE).unwrap_or(0);

    RuntimeState {
        user: None,
        schedule: ScheduleBook::from_lessons(lessons),
        focus: FocusTracker::from_history(focus_target_minutes, sessions),
        ledger: RewardLedger::from_parts(entries, stats, high_score),
        game: TargetGame::new(),
    }
}

fn decode_state<T: serde::de::DeserializeOwned>(store: &SqliteStateStore, key: &str) -> Option<T> {
    store
        .get(key)
        .ok()
        .flatten()
        .and_then(|value| serde_json::from_value(value).ok())
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, CoreError> {
    state
        .runtime
        .lock()
        .map_err(|error| CoreError::InvalidState(format!("runtime lock poisoned: {error}")))
}

#[derive(Debug, Clone, Serialize)]
pub struct AppSettingsResponse {
    pub timezone: String,
    pub focus_minutes: u32,
    pub break_minutes: u32,
    pub weekly_points_goal: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportCalendarResponse {
    pub fetched: usize,
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekDayLessonsResponse {
    pub date: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FocusStateResponse {
    pub active: bool,
    pub remaining_seconds: i64,
    pub session: Option<FocusSession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedSessionResponse {
    pub focus_minutes: i64,
    pub focus_points: i64,
    pub session: FocusSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStateResponse {
    pub phase: GamePhase,
    pub score: i64,
    pub combo: u32,
    pub time_left: u32,
    pub target: TargetPosition,
    pub high_score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameClickResponse {
    pub outcome: String,
    pub scored: i64,
    pub score: i64,
    pub combo: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameRoundResponse {
    pub time_left: u32,
    pub round_over: bool,
    pub final_score: Option<i64>,
    pub points_earned: Option<i64>,
    pub high_score: i64,
    pub new_high_score: bool,
}

pub async fn sign_in_with_provider_impl(
    state: &AppState,
    provider_id: String,
    provider_token: String,
) -> Result<UserIdentity, CoreError> {
    let session = required_identity_session(state.config_dir())?;
    let identity = session
        .sign_in_with_provider(ProviderAssertion {
            provider_id,
            provider_token,
        })
        .await?;

    let mut runtime = lock_runtime(state)?;
    runtime.user = Some(identity.clone());
    drop(runtime);
    state.log_info(
        "sign_in_with_provider",
        &format!("signed in user_id={} role={}", identity.id, identity.role.as_str()),
    );
    Ok(identity)
}

pub async fn sign_in_with_password_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<UserIdentity, CoreError> {
    let session = required_identity_session(state.config_dir())?;
    let identity = session
        .sign_in_with_password(PasswordCredentials { email, password })
        .await?;

    let mut runtime = lock_runtime(state)?;
    runtime.user = Some(identity.clone());
    drop(runtime);
    state.log_info(
        "sign_in_with_password",
        &format!("signed in user_id={}", identity.id),
    );
    Ok(identity)
}

pub async fn sign_up_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<UserIdentity, CoreError> {
    let session = required_identity_session(state.config_dir())?;
    let identity = session
        .sign_up(PasswordCredentials { email, password })
        .await?;

    let mut runtime = lock_runtime(state)?;
    runtime.user = Some(identity.clone());
    drop(runtime);
    state.log_info("sign_up", &format!("created user_id={}", identity.id));
    Ok(identity)
}

/// Persists everything, then tears the session context down: the user is
/// cleared, an in-flight focus session is abandoned without credit, and any
/// running game round is discarded.
pub fn sign_out_impl(state: &AppState) -> Result<(), CoreError> {
    match try_identity_session(state.config_dir())? {
        Some(session) => session.sign_out()?,
        None => KeyringCredentialStore::default().delete_token()?,
    }

    let mut runtime = lock_runtime(state)?;
    state.persist_all(&runtime);
    runtime.user = None;
    runtime.focus = FocusTracker::from_history(
        state.focus_target_minutes,
        runtime.focus.history().to_vec(),
    );
    runtime.game = TargetGame::new();
    drop(runtime);

    state.log_info("sign_out", "signed out and tore down session context");
    Ok(())
}

pub fn get_current_user_impl(state: &AppState) -> Result<Option<UserIdentity>, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.user.clone())
}

pub fn get_app_settings_impl(state: &AppState) -> Result<AppSettingsResponse, CoreError> {
    Ok(AppSettingsResponse {
        timezone: read_timezone(state.config_dir())?,
        focus_minutes: read_focus_minutes(state.config_dir())?,
        break_minutes: read_break_minutes(state.config_dir())?,
        weekly_points_goal: read_weekly_points_goal(state.config_dir())?,
    })
}

pub async fn import_calendar_impl(
    state: &AppState,
    time_min: Option<String>,
    time_max: Option<String>,
) -> Result<ImportCalendarResponse, CoreError> {
    let (window_start, window_end) = resolve_import_window(time_min, time_max)?;
    let timezone = read_timezone(state.config_dir())?;

    let session = required_identity_session(state.config_dir())?;
    let access_token = match session.ensure_access_token().await? {
        EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
            token.access_token
        }
        EnsureTokenResult::ReauthenticationRequired => {
            return Err(CoreError::CalendarAuthExpired);
        }
    };

    let calendar_client = Arc::new(ReqwestGraphCalendarClient::new());
    let import_service = CalendarImportService::new(calendar_client);

    // Fetch against a snapshot so the lock is never held across the request;
    // a failed fetch leaves the stored schedule untouched.
    let mut schedule = {
        let runtime = lock_runtime(state)?;
        runtime.schedule.clone()
    };
    let outcome = import_service
        .import_into(
            &mut schedule,
            &access_token,
            FetchWindow {
                start: window_start,
                end: window_end,
                timezone,
            },
        )
        .await?;

    {
        let mut runtime = lock_runtime(state)?;
        runtime.schedule = schedule;
        state.persist_schedule(&runtime);
    }

    state.log_info(
        "import_calendar",
        &format!(
            "imported {} of {} events ({} skipped)",
            outcome.imported, outcome.fetched, outcome.skipped
        ),
    );
    Ok(ImportCalendarResponse {
        fetched: outcome.fetched,
        imported: outcome.imported,
        skipped: outcome.skipped,
    })
}

pub fn add_lesson_impl(
    state: &AppState,
    date: Option<String>,
    title: String,
    time: String,
    description: Option<String>,
    is_double_lesson: bool,
) -> Result<Lesson, CoreError> {
    let date = match date {
        Some(raw) => parse_date_input(&raw, "date")?,
        None => Utc::now().date_naive(),
    };

    let mut runtime = lock_runtime(state)?;
    let lesson = runtime.schedule.add_lesson(
        next_id("lsn"),
        date,
        &title,
        &time,
        description.as_deref().unwrap_or_default(),
        is_double_lesson,
    )?;
    state.persist_schedule(&runtime);
    drop(runtime);

    state.log_info("add_lesson", &format!("added lesson_id={}", lesson.id));
    Ok(lesson)
}

pub fn delete_lesson_impl(state: &AppState, lesson_id: String) -> Result<bool, CoreError> {
    let lesson_id = lesson_id.trim();
    if lesson_id.is_empty() {
        return Err(CoreError::Validation(
            "lesson_id must not be empty".to_string(),
        ));
    }

    let mut runtime = lock_runtime(state)?;
    let removed = runtime.schedule.delete_lesson(lesson_id);
    if removed {
        state.persist_schedule(&runtime);
    }
    drop(runtime);

    if removed {
        state.log_info("delete_lesson", &format!("deleted lesson_id={lesson_id}"));
    }
    Ok(removed)
}

pub fn list_lessons_for_day_impl(
    state: &AppState,
    date: Option<String>,
) -> Result<Vec<Lesson>, CoreError> {
    let date = match date {
        Some(raw) => parse_date_input(&raw, "date")?,
        None => Utc::now().date_naive(),
    };
    let runtime = lock_runtime(state)?;
    Ok(runtime.schedule.lessons_for_day(date))
}

pub fn get_week_schedule_impl(
    state: &AppState,
    week_offset: Option<i32>,
) -> Result<Vec<WeekDayLessonsResponse>, CoreError> {
    let runtime = lock_runtime(state)?;
    let week = runtime
        .schedule
        .lessons_for_week(Utc::now().date_naive(), week_offset.unwrap_or(0));
    Ok(week
        .into_iter()
        .map(|(date, lessons)| WeekDayLessonsResponse {
            date: date.to_string(),
            lessons,
        })
        .collect())
}

pub fn get_current_lesson_impl(state: &AppState) -> Result<Option<Lesson>, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.schedule.current_lesson(Utc::now()))
}

pub fn list_upcoming_lessons_impl(state: &AppState) -> Result<Vec<Lesson>, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.schedule.upcoming_lessons(Utc::now()))
}

pub fn start_focus_session_impl(state: &AppState) -> Result<FocusStateResponse, CoreError> {
    let now = Utc::now();
    let mut runtime = lock_runtime(state)?;
    runtime.focus.start_session(next_id("ses"), now)?;
    let response = focus_state_response(&runtime, now);
    drop(runtime);

    state.log_info("start_focus_session", "started focus session");
    Ok(response)
}

pub fn record_focus_activity_impl(
    state: &AppState,
    kind: String,
    details: Option<String>,
) -> Result<bool, CoreError> {
    let kind = parse_activity_kind(&kind)?;
    let now = Utc::now();

    let mut runtime = lock_runtime(state)?;
    let recorded = runtime.focus.record_activity(
        next_id("act"),
        kind,
        details.as_deref().unwrap_or_default(),
        now,
    );
    Ok(recorded)
}

pub fn focus_tick_impl(state: &AppState) -> Result<FocusStateResponse, CoreError> {
    let now = Utc::now();
    let mut runtime = lock_runtime(state)?;
    runtime.focus.tick(now);
    Ok(focus_state_response(&runtime, now))
}

pub fn get_focus_state_impl(state: &AppState) -> Result<FocusStateResponse, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(focus_state_response(&runtime, Utc::now()))
}

pub fn stop_focus_session_impl(state: &AppState) -> Result<CompletedSessionResponse, CoreError> {
    let now = Utc::now();
    let mut runtime = lock_runtime(state)?;
    let summary = runtime.focus.stop_session(now)?;
    runtime.ledger.credit_focus(summary.focus_points, now);
    state.persist_focus_sessions(&runtime);
    state.persist_ledger(&runtime);
    drop(runtime);

    state.log_info(
        "stop_focus_session",
        &format!(
            "completed session_id={} focus_minutes={} focus_points={}",
            summary.session.id, summary.focus_minutes, summary.focus_points
        ),
    );
    Ok(CompletedSessionResponse {
        focus_minutes: summary.focus_minutes,
        focus_points: summary.focus_points,
        session: summary.session,
    })
}

pub fn submit_mood_impl(
    state: &AppState,
    lesson_id: String,
    mood: String,
    mood_state: String,
    note: Option<String>,
) -> Result<MoodEntry, CoreError> {
    let mood_state = parse_mood_state(&mood_state)?;
    let now = Utc::now();
    let today = now.date_naive();

    let mut runtime = lock_runtime(state)?;
    let Some(lesson) = runtime.schedule.lesson_by_id(lesson_id.trim()).cloned() else {
        return Err(CoreError::NotFound(format!(
            "lesson not found: {}",
            lesson_id.trim()
        )));
    };
    let entry = runtime.ledger.submit_mood(
        &lesson,
        next_id("mood"),
        &mood,
        mood_state,
        note.as_deref().unwrap_or_default(),
        today,
        now,
    )?;
    state.persist_ledger(&runtime);
    drop(runtime);

    state.log_info(
        "submit_mood",
        &format!(
            "recorded {} mood for lesson_id={} on {}",
            entry.state.as_str(),
            entry.lesson_id,
            entry.date_key
        ),
    );
    Ok(entry)
}

pub fn get_mood_stats_impl(
    state: &AppState,
    lesson_id: String,
) -> Result<MoodBreakdown, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.ledger.mood_stats(lesson_id.trim()))
}

pub fn get_weekly_mood_stats_impl(
    state: &AppState,
    week_offset: Option<i32>,
) -> Result<WeeklyMoodStats, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.ledger.weekly_mood_stats(
        runtime.schedule.lessons(),
        Utc::now().date_naive(),
        week_offset.unwrap_or(0),
    ))
}

pub fn get_reward_stats_impl(state: &AppState) -> Result<RewardStats, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.ledger.stats().clone())
}

pub fn start_game_impl(state: &AppState) -> Result<GameStateResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    runtime.game.start();
    let response = game_state_response(&runtime);
    drop(runtime);

    state.log_info("start_game", "started minigame round");
    Ok(response)
}

pub fn register_game_click_impl(
    state: &AppState,
    x: f64,
    y: f64,
) -> Result<GameClickResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    let outcome = runtime.game.register_click(x, y);
    let (label, scored) = match outcome {
        ClickOutcome::Hit { scored } => ("hit", scored),
        ClickOutcome::Miss => ("miss", 0),
        ClickOutcome::Ignored => ("ignored", 0),
    };
    Ok(GameClickResponse {
        outcome: label.to_string(),
        scored,
        score: runtime.game.score(),
        combo: runtime.game.combo(),
    })
}

pub fn game_tick_impl(state: &AppState) -> Result<GameRoundResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    let round_over = runtime.game.tick();
    let response = settle_round(state, &mut runtime, round_over);
    drop(runtime);

    if response.round_over {
        state.log_info(
            "game_tick",
            &format!(
                "round ended score={} points_earned={}",
                response.final_score.unwrap_or(0),
                response.points_earned.unwrap_or(0)
            ),
        );
    }
    Ok(response)
}

pub fn finish_game_impl(state: &AppState) -> Result<GameRoundResponse, CoreError> {
    let mut runtime = lock_runtime(state)?;
    let round_over = runtime.game.finish_early();
    let response = settle_round(state, &mut runtime, round_over);
    drop(runtime);

    if response.round_over {
        state.log_info(
            "finish_game",
            &format!("round finished early score={}", response.final_score.unwrap_or(0)),
        );
    }
    Ok(response)
}

pub fn get_game_state_impl(state: &AppState) -> Result<GameStateResponse, CoreError> {
    let runtime = lock_runtime(state)?;
    Ok(game_state_response(&runtime))
}

/// Credits the final score into the ledger when this call ended the round.
fn settle_round(state: &AppState, runtime: &mut RuntimeState, round_over: bool) -> GameRoundResponse {
    if !round_over {
        return GameRoundResponse {
            time_left: runtime.game.time_left(),
            round_over: false,
            final_score: None,
            points_earned: None,
            high_score: runtime.ledger.high_score(),
            new_high_score: false,
        };
    }

    let final_score = runtime.game.score();
    let credit = runtime.ledger.credit_game_score(final_score, Utc::now());
    state.persist_ledger(runtime);
    GameRoundResponse {
        time_left: runtime.game.time_left(),
        round_over: true,
        final_score: Some(final_score),
        points_earned: Some(credit.points_earned),
        high_score: credit.high_score,
        new_high_score: credit.new_high_score,
    }
}

fn focus_state_response(runtime: &RuntimeState, now: DateTime<Utc>) -> FocusStateResponse {
    FocusStateResponse {
        active: runtime.focus.is_active(),
        remaining_seconds: runtime.focus.remaining_seconds(now),
        session: runtime.focus.active_session().cloned(),
    }
}

fn game_state_response(runtime: &RuntimeState) -> GameStateResponse {
    GameStateResponse {
        phase: runtime.game.phase(),
        score: runtime.game.score(),
        combo: runtime.game.combo(),
        time_left: runtime.game.time_left(),
        target: runtime.game.target(),
        high_score: runtime.ledger.high_score(),
    }
}

fn required_identity_session(config_dir: &Path) -> Result<AppIdentitySession, CoreError> {
    let api_key = load_identity_api_key_from_env()?;
    build_identity_session(config_dir, api_key)
}

fn try_identity_session(config_dir: &Path) -> Result<Option<AppIdentitySession>, CoreError> {
    match load_identity_api_key_from_env() {
        Ok(api_key) => Ok(Some(build_identity_session(config_dir, api_key)?)),
        Err(CoreError::Validation(_)) => Ok(None),
        Err(error) => Err(error),
    }
}

fn build_identity_session(
    config_dir: &Path,
    api_key: String,
) -> Result<AppIdentitySession, CoreError> {
    let teacher_email_domains = read_teacher_email_domains(config_dir)?;
    Ok(IdentitySession::new(
        Arc::new(KeyringCredentialStore::default()),
        Arc::new(ReqwestIdentityClient::new(api_key)),
        teacher_email_domains,
    ))
}

fn load_identity_api_key_from_env() -> Result<String, CoreError> {
    load_identity_api_key_from_lookup(|key| std::env::var(key).ok())
}

fn load_identity_api_key_from_lookup<F>(lookup: F) -> Result<String, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    const KEYS: [&str; 2] = ["FOCUSFRIEND_IDENTITY_API_KEY", "IDENTITY_API_KEY"];
    for key in KEYS {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Ok(normalized.to_string());
            }
        }
    }
    Err(CoreError::Validation(format!(
        "missing identity api key (set one of: {})",
        KEYS.join(", ")
    )))
}

fn resolve_import_window(
    time_min: Option<String>,
    time_max: Option<String>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CoreError> {
    let default_start = {
        let today = Utc::now().date_naive();
        Utc.from_utc_datetime(&today.and_hms_opt(0, 0, 0).expect("valid midnight"))
    };
    let start = match time_min {
        Some(raw) => parse_datetime_input(&raw, "time_min")?,
        None => default_start,
    };
    let end = match time_max {
        Some(raw) => parse_datetime_input(&raw, "time_max")?,
        None => start + Duration::days(DEFAULT_IMPORT_WINDOW_DAYS),
    };
    if end <= start {
        return Err(CoreError::Validation(
            "time_max must be greater than time_min".to_string(),
        ));
    }
    Ok((start, end))
}

fn parse_datetime_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, CoreError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight")));
    }
    Err(CoreError::Validation(format!(
        "{field_name} must be RFC3339 or YYYY-MM-DD"
    )))
}

fn parse_date_input(value: &str, field_name: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| CoreError::Validation(format!("{field_name} must be YYYY-MM-DD: {error}")))
}

fn parse_activity_kind(value: &str) -> Result<ActivityKind, CoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "leave" => Ok(ActivityKind::Leave),
        "return" => Ok(ActivityKind::Return),
        "tab_switch" | "tab-switch" => Ok(ActivityKind::TabSwitch),
        "window_focus" | "window-focus" => Ok(ActivityKind::WindowFocus),
        other => Err(CoreError::Validation(format!(
            "unsupported activity kind: {}",
            other
        ))),
    }
}

fn parse_mood_state(value: &str) -> Result<MoodState, CoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "focused" => Ok(MoodState::Focused),
        "bored" => Ok(MoodState::Bored),
        "stressed" => Ok(MoodState::Stressed),
        "neutral" => Ok(MoodState::Neutral),
        other => Err(CoreError::Validation(format!(
            "unsupported mood state: {}",
            other
        ))),
    }
}
