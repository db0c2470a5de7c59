use serde::{Deserialize, Serialize};

/// Default Ollama server address.
pub const DEFAULT_OLLAMA_ADDRESS: &str = "http://127.0.0.1:11434";

/// Default local model.
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3";

/// Configuration stored in ~/.obsidian-planner/config.json
///
/// Keys are snake_case to stay compatible with config files written by
/// earlier planner builds (`calendar_url`, `jira_email`, `jira_token`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calendar_url: String,
    #[serde(default)]
    pub jira_email: String,
    #[serde(default)]
    pub jira_token: String,
    #[serde(default = "default_ollama_address")]
    pub ollama_address: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
    /// Skip Google Calendar entirely; the planner runs with an empty calendar.
    #[serde(default)]
    pub offline: bool,
}

fn default_ollama_address() -> String {
    DEFAULT_OLLAMA_ADDRESS.to_string()
}

fn default_ollama_model() -> String {
    DEFAULT_OLLAMA_MODEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calendar_url: String::new(),
            jira_email: String::new(),
            jira_token: String::new(),
            ollama_address: default_ollama_address(),
            ollama_model: default_ollama_model(),
            offline: false,
        }
    }
}

/// Calendar event kinds the planner keeps. Anything else the provider
/// reports (`outOfOffice`, `workingLocation`, `birthday`, ...) is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Event,
    FocusTime,
}

impl EventType {
    /// Map a provider `eventType` tag onto the allow-list.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "event" => Some(EventType::Event),
            "focusTime" => Some(EventType::FocusTime),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            EventType::Event => "event",
            EventType::FocusTime => "focusTime",
        }
    }
}

/// A calendar event as the planner sees it.
///
/// `start` and `end` carry the provider's strings unchanged: an RFC 3339
/// date-time for timed events, a bare `YYYY-MM-DD` date for all-day events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub name: String,
    pub start: String,
    pub end: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl CalendarEvent {
    pub fn is_all_day(&self) -> bool {
        !self.start.contains('T')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let json = r#"{"calendar_url": "https://example.com/cal.ics"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.calendar_url, "https://example.com/cal.ics");
        assert_eq!(config.jira_email, "");
        assert_eq!(config.ollama_address, DEFAULT_OLLAMA_ADDRESS);
        assert_eq!(config.ollama_model, DEFAULT_OLLAMA_MODEL);
        assert!(!config.offline);
    }

    #[test]
    fn test_event_type_allow_list() {
        assert_eq!(EventType::from_tag("event"), Some(EventType::Event));
        assert_eq!(EventType::from_tag("focusTime"), Some(EventType::FocusTime));
        assert_eq!(EventType::from_tag("outOfOffice"), None);
        assert_eq!(EventType::from_tag("FocusTime"), None);
    }

    #[test]
    fn test_calendar_event_serializes_type_tag() {
        let event = CalendarEvent {
            name: "Deep work".to_string(),
            start: "2023-10-27T12:00:00Z".to_string(),
            end: "2023-10-27T13:00:00Z".to_string(),
            event_type: EventType::FocusTime,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "focusTime");
        assert!(!event.is_all_day());
    }
}
