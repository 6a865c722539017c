use crate::infrastructure::error::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use url::Url;

const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0/";
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
}

impl FetchWindow {
    pub fn validate(&self) -> Result<Tz, CoreError> {
        if self.end <= self.start {
            return Err(CoreError::Validation(
                "fetch window end must be after start".to_string(),
            ));
        }
        self.timezone.trim().parse::<Tz>().map_err(|_| {
            CoreError::Validation(format!("unknown timezone: {}", self.timezone))
        })
    }
}

/// A calendar event normalized off the wire, before it becomes a Lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub external_id: String,
    pub subject: String,
    pub body_preview: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub location: Option<String>,
    pub importance: Option<String>,
    pub busy_status: Option<String>,
    pub is_recurring: bool,
    pub series_id: Option<String>,
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn list_events(
        &self,
        access_token: &str,
        window: FetchWindow,
    ) -> Result<Vec<CalendarEvent>, CoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGraphCalendarClient {
    client: Client,
    api_base: String,
}

#[derive(Debug, serde::Deserialize)]
struct GraphEventPage {
    value: Option<Vec<GraphEventPayload>>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct GraphEventPayload {
    id: Option<String>,
    subject: Option<String>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
    importance: Option<String>,
    #[serde(rename = "showAs")]
    show_as: Option<String>,
    #[serde(rename = "isCancelled")]
    is_cancelled: Option<bool>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    #[serde(rename = "seriesMasterId")]
    series_master_id: Option<String>,
    start: Option<GraphDateTime>,
    end: Option<GraphDateTime>,
    location: Option<GraphLocation>,
}

#[derive(Debug, serde::Deserialize)]
struct GraphDateTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct GraphLocation {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

impl ReqwestGraphCalendarClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            api_base: GRAPH_API_BASE.to_string(),
        }
    }

    fn calendar_view_endpoint(&self, window: &FetchWindow) -> Result<Url, CoreError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| CoreError::Calendar(format!("invalid graph api base url: {error}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CoreError::Calendar("graph api base URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push("me");
            segments.push("calendarView");
        }
        url.query_pairs_mut()
            .append_pair("startDateTime", &window.start.to_rfc3339())
            .append_pair("endDateTime", &window.end.to_rfc3339())
            .append_pair("$top", &PAGE_SIZE.to_string());
        Ok(url)
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        endpoint: &str,
        timezone: &str,
    ) -> Result<GraphEventPage, CoreError> {
        let response = self
            .client
            .get(endpoint)
            .bearer_auth(access_token)
            .header("Prefer", format!("outlook.timezone=\"{timezone}\""))
            .send()
            .await
            .map_err(|error| CoreError::Calendar(format!("request failed: {error}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CoreError::CalendarAuthExpired);
        }
        let raw = response
            .text()
            .await
            .map_err(|error| CoreError::Calendar(format!("failed to read response body: {error}")))?;
        if !status.is_success() {
            let message = if raw.trim().is_empty() {
                format!("calendar api error: http {}", status.as_u16())
            } else {
                format!("calendar api error: http {}; body={raw}", status.as_u16())
            };
            return Err(CoreError::Calendar(message));
        }

        serde_json::from_str(&raw)
            .map_err(|error| CoreError::Calendar(format!("malformed calendar payload: {error}")))
    }
}

#[async_trait]
impl CalendarClient for ReqwestGraphCalendarClient {
    async fn list_events(
        &self,
        access_token: &str,
        window: FetchWindow,
    ) -> Result<Vec<CalendarEvent>, CoreError> {
        if access_token.trim().is_empty() {
            return Err(CoreError::CalendarAuthExpired);
        }
        window.validate()?;

        let mut events = Vec::new();
        let mut endpoint = self.calendar_view_endpoint(&window)?.to_string();
        loop {
            let page = self
                .fetch_page(access_token, &endpoint, &window.timezone)
                .await?;
            for payload in page.value.unwrap_or_default() {
                if let Some(event) = event_from_payload(payload)? {
                    events.push(event);
                }
            }
            match page.next_link {
                Some(next_link) if !next_link.trim().is_empty() => endpoint = next_link,
                _ => break,
            }
        }
        Ok(events)
    }
}

fn event_from_payload(payload: GraphEventPayload) -> Result<Option<CalendarEvent>, CoreError> {
    if payload.is_cancelled.unwrap_or(false) {
        return Ok(None);
    }
    let Some(external_id) = payload
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
    else {
        return Ok(None);
    };
    let (Some(start), Some(end)) = (payload.start, payload.end) else {
        return Ok(None);
    };

    let start_at = parse_graph_datetime(&start, "start")?;
    let end_at = parse_graph_datetime(&end, "end")?;
    let is_recurring = payload
        .event_type
        .as_deref()
        .map(|value| value.eq_ignore_ascii_case("occurrence") || value.eq_ignore_ascii_case("seriesMaster"))
        .unwrap_or(false)
        || payload.series_master_id.is_some();

    Ok(Some(CalendarEvent {
        external_id,
        subject: payload.subject.unwrap_or_default(),
        body_preview: payload.body_preview.unwrap_or_default(),
        start_at,
        end_at,
        location: payload
            .location
            .and_then(|location| location.display_name)
            .filter(|value| !value.trim().is_empty()),
        importance: payload.importance,
        busy_status: payload.show_as,
        is_recurring,
        series_id: payload.series_master_id,
    }))
}

fn parse_graph_datetime(value: &GraphDateTime, field_name: &str) -> Result<DateTime<Utc>, CoreError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&value.date_time) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(&value.date_time, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|error| {
            CoreError::Calendar(format!(
                "invalid calendar event {field_name} '{}': {error}",
                value.date_time
            ))
        })?;
    let tz_name = value.time_zone.as_deref().unwrap_or("UTC");
    let tz = tz_name
        .parse::<Tz>()
        .map_err(|_| CoreError::Calendar(format!("unknown event timezone: {tz_name}")))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            CoreError::Calendar(format!(
                "calendar event {field_name} '{}' has no valid instant in {tz_name}",
                value.date_time
            ))
        })
}
