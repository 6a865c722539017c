use crate::infrastructure::error::CoreError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const TIMER_JSON: &str = "timer.json";

const DEFAULT_FOCUS_MINUTES: u32 = 25;
const DEFAULT_BREAK_MINUTES: u32 = 5;
const DEFAULT_WEEKLY_POINTS_GOAL: u32 = 200;

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "FocusFriend",
                "timezone": "UTC",
                "weeklyPointsGoal": DEFAULT_WEEKLY_POINTS_GOAL,
                "teacherEmailDomains": []
            }),
        ),
        (
            TIMER_JSON,
            serde_json::json!({
                "schema": 1,
                "focusMinutes": DEFAULT_FOCUS_MINUTES,
                "breakMinutes": DEFAULT_BREAK_MINUTES
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), CoreError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, CoreError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CoreError::Validation(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(CoreError::Validation(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_timezone(config_dir: &Path) -> Result<String, CoreError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("UTC")
        .to_string())
}

pub fn read_weekly_points_goal(config_dir: &Path) -> Result<u32, CoreError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("weeklyPointsGoal")
        .and_then(serde_json::Value::as_u64)
        .map(|value| value as u32)
        .unwrap_or(DEFAULT_WEEKLY_POINTS_GOAL))
}

pub fn read_teacher_email_domains(config_dir: &Path) -> Result<Vec<String>, CoreError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("teacherEmailDomains")
        .and_then(serde_json::Value::as_array)
        .map(|domains| {
            domains
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default())
}

pub fn read_focus_minutes(config_dir: &Path) -> Result<u32, CoreError> {
    read_timer_minutes(config_dir, "focusMinutes", DEFAULT_FOCUS_MINUTES)
}

pub fn read_break_minutes(config_dir: &Path) -> Result<u32, CoreError> {
    read_timer_minutes(config_dir, "breakMinutes", DEFAULT_BREAK_MINUTES)
}

fn read_timer_minutes(config_dir: &Path, field: &str, default: u32) -> Result<u32, CoreError> {
    let timer = read_config(&config_dir.join(TIMER_JSON))?;
    Ok(timer
        .get(field)
        .and_then(serde_json::Value::as_u64)
        .map(|value| value.max(1) as u32)
        .unwrap_or(default))
}
