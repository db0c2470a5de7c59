//! Context snapshot assembly: goals, calendar, tickets and tasks gathered
//! fresh for every chat or plan-generation call.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use serde::Serialize;

use crate::error::PlannerError;
use crate::google_api::GoogleApiError;
use crate::types::CalendarEvent;

/// Source of a day's calendar events, already filtered to real event types.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events overlapping `[start_of_day, start_of_day + 24h)`.
    async fn list_events(&self, start_of_day: DateTime<Local>) -> Result<Vec<CalendarEvent>, GoogleApiError>;
}

/// Everything a flow template is rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerContext {
    pub weekly_goals: String,
    pub calendar_events: Vec<CalendarEvent>,
    pub jira_tickets: Vec<String>,
    pub current_tasks: Vec<String>,
}

type TextProvider = Box<dyn Fn() -> String + Send + Sync>;
type ListProvider = Box<dyn Fn() -> Vec<String> + Send + Sync>;

/// Injection points for the non-calendar parts of the snapshot.
///
/// The defaults are fixed placeholders until Obsidian notes and Jira are
/// wired in.
pub struct ContextProviders {
    weekly_goals: TextProvider,
    jira_tickets: ListProvider,
    current_tasks: ListProvider,
}

pub const PLACEHOLDER_WEEKLY_GOALS: &str =
    "Plan for project unicorn, Review roadmap, Improve test coverage 10%";

pub const PLACEHOLDER_JIRA_TICKETS: &[&str] =
    &["Jira-123: Update db", "Jira-456: Fix bug on backend"];

impl Default for ContextProviders {
    fn default() -> Self {
        Self {
            weekly_goals: Box::new(|| PLACEHOLDER_WEEKLY_GOALS.to_string()),
            jira_tickets: Box::new(|| PLACEHOLDER_JIRA_TICKETS.iter().map(|t| t.to_string()).collect()),
            current_tasks: Box::new(Vec::<String>::new),
        }
    }
}

impl ContextProviders {
    pub fn with_weekly_goals(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.weekly_goals = Box::new(f);
        self
    }

    pub fn with_jira_tickets(mut self, f: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        self.jira_tickets = Box::new(f);
        self
    }

    pub fn with_current_tasks(mut self, f: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        self.current_tasks = Box::new(f);
        self
    }
}

/// Local midnight at the start of `day`.
///
/// When midnight falls in a DST gap the UTC reading of the same wall-clock
/// time is used.
pub fn start_of_day(day: NaiveDate) -> DateTime<Local> {
    let naive = day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

pub struct ContextAssembler {
    calendar: Option<Box<dyn CalendarSource>>,
    providers: ContextProviders,
}

impl ContextAssembler {
    pub fn new(calendar: Option<Box<dyn CalendarSource>>, providers: ContextProviders) -> Self {
        Self { calendar, providers }
    }

    /// Build a fresh snapshot for `day`.
    ///
    /// Issues exactly one calendar query when a source is configured; a
    /// calendar failure is returned as [`PlannerError::ContextFetch`].
    pub async fn fetch_context(&self, day: NaiveDate) -> Result<PlannerContext, PlannerError> {
        let calendar_events = match &self.calendar {
            Some(source) => source.list_events(start_of_day(day)).await?,
            None => Vec::new(),
        };

        Ok(PlannerContext {
            weekly_goals: (self.providers.weekly_goals)(),
            calendar_events,
            jira_tickets: (self.providers.jira_tickets)(),
            current_tasks: (self.providers.current_tasks)(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::EventType;
    use std::sync::{Arc, Mutex};

    /// In-memory calendar that records every window it was asked for.
    pub(crate) struct FakeCalendar {
        pub events: Vec<CalendarEvent>,
        pub fail: bool,
        pub calls: Arc<Mutex<Vec<DateTime<Local>>>>,
    }

    impl FakeCalendar {
        pub(crate) fn with_events(events: Vec<CalendarEvent>) -> Self {
            Self {
                events,
                fail: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                events: Vec::new(),
                fail: true,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl CalendarSource for FakeCalendar {
        async fn list_events(&self, start_of_day: DateTime<Local>) -> Result<Vec<CalendarEvent>, GoogleApiError> {
            self.calls.lock().unwrap().push(start_of_day);
            if self.fail {
                return Err(GoogleApiError::AuthExpired);
            }
            Ok(self.events.clone())
        }
    }

    pub(crate) fn standup() -> CalendarEvent {
        CalendarEvent {
            name: "Team Standup".to_string(),
            start: "2023-10-27T09:00:00-04:00".to_string(),
            end: "2023-10-27T09:30:00-04:00".to_string(),
            event_type: EventType::Event,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, 27).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_context_defaults_and_calendar() {
        let calendar = FakeCalendar::with_events(vec![standup()]);
        let calls = calendar.calls.clone();
        let assembler = ContextAssembler::new(Some(Box::new(calendar)), ContextProviders::default());

        let ctx = assembler.fetch_context(day()).await.unwrap();
        assert_eq!(ctx.weekly_goals, PLACEHOLDER_WEEKLY_GOALS);
        assert_eq!(ctx.jira_tickets, vec!["Jira-123: Update db", "Jira-456: Fix bug on backend"]);
        assert!(ctx.current_tasks.is_empty());
        assert_eq!(ctx.calendar_events, vec![standup()]);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], start_of_day(day()));
    }

    #[tokio::test]
    async fn test_fetch_context_queries_every_time() {
        let calendar = FakeCalendar::with_events(vec![]);
        let calls = calendar.calls.clone();
        let assembler = ContextAssembler::new(Some(Box::new(calendar)), ContextProviders::default());

        assembler.fetch_context(day()).await.unwrap();
        assembler.fetch_context(day()).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_context_propagates_calendar_error() {
        let assembler =
            ContextAssembler::new(Some(Box::new(FakeCalendar::failing())), ContextProviders::default());
        let err = assembler.fetch_context(day()).await.unwrap_err();
        assert!(matches!(err, PlannerError::ContextFetch(GoogleApiError::AuthExpired)));
    }

    #[tokio::test]
    async fn test_fetch_context_without_calendar() {
        let assembler = ContextAssembler::new(None, ContextProviders::default());
        let ctx = assembler.fetch_context(day()).await.unwrap();
        assert!(ctx.calendar_events.is_empty());
    }

    #[tokio::test]
    async fn test_injected_providers() {
        let providers = ContextProviders::default()
            .with_weekly_goals(|| "Ship v2".to_string())
            .with_jira_tickets(Vec::new)
            .with_current_tasks(|| vec!["Write release notes".to_string()]);
        let assembler = ContextAssembler::new(None, providers);

        let ctx = assembler.fetch_context(day()).await.unwrap();
        assert_eq!(ctx.weekly_goals, "Ship v2");
        assert!(ctx.jira_tickets.is_empty());
        assert_eq!(ctx.current_tasks, vec!["Write release notes"]);
    }

    #[test]
    fn test_start_of_day_is_local_midnight() {
        let start = start_of_day(day());
        assert_eq!(start.date_naive(), day());
        assert_eq!(start.time(), NaiveTime::MIN);
    }
}
