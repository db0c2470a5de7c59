//! Google Calendar API v3: one day of events from the primary calendar.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;

use super::GoogleApiError;
use crate::planner::CalendarSource;
use crate::types::{CalendarEvent, EventType};

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Google returns at most this many events per day query.
pub const MAX_RESULTS: u32 = 10;

// ============================================================================
// API response types (deserialized from Google Calendar JSON)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<GoogleEventRaw>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventRaw {
    #[serde(default)]
    summary: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    /// Absent on older events; Google treats those as "event".
    #[serde(default = "default_event_type")]
    event_type: String,
}

fn default_event_type() -> String {
    "event".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventDateTime {
    /// Timed events carry `dateTime`; all-day events only `date`.
    fn value(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Keep only `event` and `focusTime` entries, in their original order.
///
/// All-day events keep their bare date strings. Events whose start is not
/// before their end are dropped.
fn filter_events(items: Vec<GoogleEventRaw>) -> Vec<CalendarEvent> {
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        let Some(event_type) = EventType::from_tag(&item.event_type) else {
            continue;
        };

        let start = item.start.as_ref().and_then(|s| s.value()).unwrap_or("").to_string();
        let end = item.end.as_ref().and_then(|s| s.value()).unwrap_or("").to_string();
        let name = item.summary.unwrap_or_else(|| "(No title)".to_string());

        if let (Some(s), Some(e)) = (parse_event_datetime(&start), parse_event_datetime(&end)) {
            if s >= e {
                log::warn!("Dropping calendar event '{}': start {} is not before end {}", name, start, end);
                continue;
            }
        }

        events.push(CalendarEvent {
            name,
            start,
            end,
            event_type,
        });
    }
    events
}

/// Parse an ISO datetime or bare date string to a chrono DateTime<Utc>.
pub fn parse_event_datetime(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if s.contains('T') {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        // Date-only (all-day event), treat as midnight UTC
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
    }
}

// ============================================================================
// Calendar API
// ============================================================================

/// Query parameters for the events overlapping `[start, start + 24h)`.
///
/// Deleted events are excluded and recurring events are expanded to single
/// instances, ordered by start time and capped at [`MAX_RESULTS`].
pub fn day_query(start: DateTime<Local>) -> Vec<(&'static str, String)> {
    vec![
        ("timeMin", start.to_rfc3339()),
        ("timeMax", (start + chrono::Duration::hours(24)).to_rfc3339()),
        ("showDeleted", "false".to_string()),
        ("singleEvents", "true".to_string()),
        ("orderBy", "startTime".to_string()),
        ("maxResults", MAX_RESULTS.to_string()),
    ]
}

/// Fetch the day's events starting at `start`; see [`day_query`].
pub async fn fetch_day_events(
    client: &reqwest::Client,
    access_token: &str,
    start: DateTime<Local>,
) -> Result<Vec<CalendarEvent>, GoogleApiError> {
    let resp = client
        .get(EVENTS_URL)
        .bearer_auth(access_token)
        .query(&day_query(start))
        .send()
        .await?;

    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(GoogleApiError::AuthExpired);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GoogleApiError::ApiError {
            status: status.as_u16(),
            message: body,
        });
    }

    let body: CalendarListResponse = resp.json().await?;
    let raw_count = body.items.len();
    let events = filter_events(body.items);
    log::debug!(
        "Calendar returned {} events for {}, kept {}",
        raw_count,
        start.date_naive(),
        events.len()
    );
    Ok(events)
}

/// [`CalendarSource`] backed by the user's primary Google Calendar.
///
/// Refreshes the stored OAuth token on demand before each query.
pub struct GoogleCalendarClient {
    client: reqwest::Client,
}

impl Default for GoogleCalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GoogleCalendarClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn list_events(&self, start_of_day: DateTime<Local>) -> Result<Vec<CalendarEvent>, GoogleApiError> {
        let access_token = super::get_valid_access_token().await?;
        fetch_day_events(&self.client, &access_token, start_of_day).await
    }
}
