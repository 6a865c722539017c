mod application;
mod domain;
mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    add_lesson_impl, delete_lesson_impl, finish_game_impl, focus_tick_impl, game_tick_impl,
    get_app_settings_impl, get_current_lesson_impl, get_current_user_impl, get_focus_state_impl,
    get_game_state_impl, get_mood_stats_impl, get_reward_stats_impl, get_week_schedule_impl,
    get_weekly_mood_stats_impl, import_calendar_impl, list_lessons_for_day_impl,
    list_upcoming_lessons_impl, record_focus_activity_impl, register_game_click_impl,
    sign_in_with_password_impl, sign_in_with_provider_impl, sign_out_impl, sign_up_impl,
    start_focus_session_impl, start_game_impl, stop_focus_session_impl, submit_mood_impl,
    AppSettingsResponse, AppState, CompletedSessionResponse, FocusStateResponse,
    GameClickResponse, GameRoundResponse, GameStateResponse, ImportCalendarResponse,
    WeekDayLessonsResponse,
};
use application::rewards::{MoodBreakdown, WeeklyMoodStats};
use domain::models::{Lesson, MoodEntry, RewardStats, UserIdentity};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct BootstrapResponse {
    workspace_root: String,
    database_path: String,
}

#[tauri::command]
fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

#[tauri::command]
fn ping() -> &'static str {
    "pong"
}

#[tauri::command]
async fn sign_in_with_provider(
    state: tauri::State<'_, AppState>,
    provider_id: String,
    provider_token: String,
) -> Result<UserIdentity, String> {
    sign_in_with_provider_impl(state.inner(), provider_id, provider_token)
        .await
        .map_err(|error| state.command_error("sign_in_with_provider", &error))
}

#[tauri::command]
async fn sign_in_with_password(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<UserIdentity, String> {
    sign_in_with_password_impl(state.inner(), email, password)
        .await
        .map_err(|error| state.command_error("sign_in_with_password", &error))
}

#[tauri::command]
async fn sign_up(
    state: tauri::State<'_, AppState>,
    email: String,
    password: String,
) -> Result<UserIdentity, String> {
    sign_up_impl(state.inner(), email, password)
        .await
        .map_err(|error| state.command_error("sign_up", &error))
}

#[tauri::command]
fn sign_out(state: tauri::State<'_, AppState>) -> Result<(), String> {
    sign_out_impl(state.inner()).map_err(|error| state.command_error("sign_out", &error))
}

#[tauri::command]
fn get_current_user(state: tauri::State<'_, AppState>) -> Result<Option<UserIdentity>, String> {
    get_current_user_impl(state.inner())
        .map_err(|error| state.command_error("get_current_user", &error))
}

#[tauri::command]
fn get_app_settings(state: tauri::State<'_, AppState>) -> Result<AppSettingsResponse, String> {
    get_app_settings_impl(state.inner())
        .map_err(|error| state.command_error("get_app_settings", &error))
}

#[tauri::command]
async fn import_calendar(
    state: tauri::State<'_, AppState>,
    time_min: Option<String>,
    time_max: Option<String>,
) -> Result<ImportCalendarResponse, String> {
    import_calendar_impl(state.inner(), time_min, time_max)
        .await
        .map_err(|error| state.command_error("import_calendar", &error))
}

#[tauri::command]
fn add_lesson(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
    title: String,
    time: String,
    description: Option<String>,
    is_double_lesson: Option<bool>,
) -> Result<Lesson, String> {
    add_lesson_impl(
        state.inner(),
        date,
        title,
        time,
        description,
        is_double_lesson.unwrap_or(false),
    )
    .map_err(|error| state.command_error("add_lesson", &error))
}

#[tauri::command]
fn delete_lesson(state: tauri::State<'_, AppState>, lesson_id: String) -> Result<bool, String> {
    delete_lesson_impl(state.inner(), lesson_id)
        .map_err(|error| state.command_error("delete_lesson", &error))
}

#[tauri::command]
fn list_lessons_for_day(
    state: tauri::State<'_, AppState>,
    date: Option<String>,
) -> Result<Vec<Lesson>, String> {
    list_lessons_for_day_impl(state.inner(), date)
        .map_err(|error| state.command_error("list_lessons_for_day", &error))
}

#[tauri::command]
fn get_week_schedule(
    state: tauri::State<'_, AppState>,
    week_offset: Option<i32>,
) -> Result<Vec<WeekDayLessonsResponse>, String> {
    get_week_schedule_impl(state.inner(), week_offset)
        .map_err(|error| state.command_error("get_week_schedule", &error))
}

#[tauri::command]
fn get_current_lesson(state: tauri::State<'_, AppState>) -> Result<Option<Lesson>, String> {
    get_current_lesson_impl(state.inner())
        .map_err(|error| state.command_error("get_current_lesson", &error))
}

#[tauri::command]
fn list_upcoming_lessons(state: tauri::State<'_, AppState>) -> Result<Vec<Lesson>, String> {
    list_upcoming_lessons_impl(state.inner())
        .map_err(|error| state.command_error("list_upcoming_lessons", &error))
}

#[tauri::command]
fn start_focus_session(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    start_focus_session_impl(state.inner())
        .map_err(|error| state.command_error("start_focus_session", &error))
}

#[tauri::command]
fn record_focus_activity(
    state: tauri::State<'_, AppState>,
    kind: String,
    details: Option<String>,
) -> Result<bool, String> {
    record_focus_activity_impl(state.inner(), kind, details)
        .map_err(|error| state.command_error("record_focus_activity", &error))
}

#[tauri::command]
fn focus_tick(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    focus_tick_impl(state.inner()).map_err(|error| state.command_error("focus_tick", &error))
}

#[tauri::command]
fn get_focus_state(state: tauri::State<'_, AppState>) -> Result<FocusStateResponse, String> {
    get_focus_state_impl(state.inner())
        .map_err(|error| state.command_error("get_focus_state", &error))
}

#[tauri::command]
fn stop_focus_session(
    state: tauri::State<'_, AppState>,
) -> Result<CompletedSessionResponse, String> {
    stop_focus_session_impl(state.inner())
        .map_err(|error| state.command_error("stop_focus_session", &error))
}

#[tauri::command]
fn submit_mood(
    state: tauri::State<'_, AppState>,
    lesson_id: String,
    mood: String,
    mood_state: String,
    note: Option<String>,
) -> Result<MoodEntry, String> {
    submit_mood_impl(state.inner(), lesson_id, mood, mood_state, note)
        .map_err(|error| state.command_error("submit_mood", &error))
}

#[tauri::command]
fn get_mood_stats(
    state: tauri::State<'_, AppState>,
    lesson_id: String,
) -> Result<MoodBreakdown, String> {
    get_mood_stats_impl(state.inner(), lesson_id)
        .map_err(|error| state.command_error("get_mood_stats", &error))
}

#[tauri::command]
fn get_weekly_mood_stats(
    state: tauri::State<'_, AppState>,
    week_offset: Option<i32>,
) -> Result<WeeklyMoodStats, String> {
    get_weekly_mood_stats_impl(state.inner(), week_offset)
        .map_err(|error| state.command_error("get_weekly_mood_stats", &error))
}

#[tauri::command]
fn get_reward_stats(state: tauri::State<'_, AppState>) -> Result<RewardStats, String> {
    get_reward_stats_impl(state.inner())
        .map_err(|error| state.command_error("get_reward_stats", &error))
}

#[tauri::command]
fn start_game(state: tauri::State<'_, AppState>) -> Result<GameStateResponse, String> {
    start_game_impl(state.inner()).map_err(|error| state.command_error("start_game", &error))
}

#[tauri::command]
fn register_game_click(
    state: tauri::State<'_, AppState>,
    x: f64,
    y: f64,
) -> Result<GameClickResponse, String> {
    register_game_click_impl(state.inner(), x, y)
        .map_err(|error| state.command_error("register_game_click", &error))
}

#[tauri::command]
fn game_tick(state: tauri::State<'_, AppState>) -> Result<GameRoundResponse, String> {
    game_tick_impl(state.inner()).map_err(|error| state.command_error("game_tick", &error))
}

#[tauri::command]
fn finish_game(state: tauri::State<'_, AppState>) -> Result<GameRoundResponse, String> {
    finish_game_impl(state.inner()).map_err(|error| state.command_error("finish_game", &error))
}

#[tauri::command]
fn get_game_state(state: tauri::State<'_, AppState>) -> Result<GameStateResponse, String> {
    get_game_state_impl(state.inner())
        .map_err(|error| state.command_error("get_game_state", &error))
}

pub fn run() {
    let workspace_root = std::env::current_dir().expect("failed to resolve current directory");
    let app_state = AppState::new(workspace_root).expect("failed to initialize app state");

    tauri::Builder::default()
        .manage(app_state)
        .invoke_handler(tauri::generate_handler![
            ping,
            bootstrap,
            sign_in_with_provider,
            sign_in_with_password,
            sign_up,
            sign_out,
            get_current_user,
            get_app_settings,
            import_calendar,
            add_lesson,
            delete_lesson,
            list_lessons_for_day,
            get_week_schedule,
            get_current_lesson,
            list_upcoming_lessons,
            start_focus_session,
            record_focus_activity,
            focus_tick,
            get_focus_state,
            stop_focus_session,
            submit_mood,
            get_mood_stats,
            get_weekly_mood_stats,
            get_reward_stats,
            start_game,
            register_game_click,
            game_tick,
            finish_game,
            get_game_state
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
