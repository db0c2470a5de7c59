//! Chat shell state: transcript, input line and the turn lifecycle.
//!
//! The shell owns the [`FlowRouter`]. While a turn is in flight the router
//! is moved into the background task and handed back with the result, so
//! only one turn can ever be outstanding.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::PlannerError;
use crate::planner::{classify, Flow, FlowRouter, TurnOutcome};

pub const WELCOME: &str = "Welcome to the obsidian planner!\nType a message and press Enter to send.\n\
Say \"generate\" to draft today's note, /condense to compact the conversation, Esc to quit.";

/// Longest input line accepted.
pub const INPUT_CHAR_LIMIT: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingResponse,
    Condensing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Info,
    You,
    Bot,
    Error,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

/// Recovery line shown under a failed turn.
pub fn error_hint(err: &PlannerError) -> String {
    let suggestion = err.recovery_suggestion();
    if err.requires_user_action() {
        format!("Action needed: {}", suggestion)
    } else if err.is_retryable() {
        format!("Temporary failure. {}", suggestion)
    } else {
        suggestion.to_string()
    }
}

pub struct ChatApp {
    pub transcript: Vec<TranscriptLine>,
    pub input: String,
    pub phase: Phase,
    /// Lines scrolled up from the bottom; 0 follows new output.
    pub scroll_from_bottom: u16,
    pub spinner_tick: usize,
    pub should_quit: bool,
    router: Option<FlowRouter>,
}

impl ChatApp {
    pub fn new(router: FlowRouter) -> Self {
        Self {
            transcript: vec![TranscriptLine {
                speaker: Speaker::Info,
                text: WELCOME.to_string(),
            }],
            input: String::new(),
            phase: Phase::Idle,
            scroll_from_bottom: 0,
            spinner_tick: 0,
            should_quit: false,
            router: Some(router),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(TranscriptLine {
            speaker,
            text: text.into(),
        });
        self.scroll_from_bottom = 0;
    }

    /// Handle a key press. Returns a line to submit when Enter was pressed.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<String> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::PageUp | KeyCode::Up => {
                let step = if key.code == KeyCode::PageUp { 10 } else { 1 };
                self.scroll_from_bottom = self.scroll_from_bottom.saturating_add(step);
            }
            KeyCode::PageDown | KeyCode::Down => {
                let step = if key.code == KeyCode::PageDown { 10 } else { 1 };
                self.scroll_from_bottom = self.scroll_from_bottom.saturating_sub(step);
            }
            KeyCode::End => self.scroll_from_bottom = 0,
            _ if self.is_loading() => {}
            KeyCode::Enter => {
                if self.input.trim().is_empty() {
                    return None;
                }
                return Some(std::mem::take(&mut self.input));
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => {
                if self.input.chars().count() < INPUT_CHAR_LIMIT {
                    self.input.push(c);
                }
            }
            _ => {}
        }
        None
    }

    /// Start a turn: record the user line and hand out the router.
    ///
    /// Returns `None` when a turn is already running.
    pub fn begin_turn(&mut self, line: String) -> Option<(FlowRouter, String)> {
        if self.is_loading() {
            return None;
        }
        let router = self.router.take()?;

        self.phase = match classify(&line) {
            Flow::Condense => Phase::Condensing,
            Flow::Chat | Flow::GeneratePlan => Phase::AwaitingResponse,
        };
        self.spinner_tick = 0;
        self.push(Speaker::You, line.clone());
        Some((router, line))
    }

    /// Take the router back and render the outcome.
    pub fn finish_turn(&mut self, router: FlowRouter, result: Result<TurnOutcome, PlannerError>) {
        self.router = Some(router);
        self.phase = Phase::Idle;

        match result {
            Ok(outcome) if outcome.flow == Flow::Condense => {
                self.push(Speaker::Info, "Conversation condensed into a summary.");
            }
            Ok(outcome) => self.push(Speaker::Bot, outcome.reply),
            Err(e) => {
                log::warn!("Turn failed: {}", e);
                self.push(Speaker::Error, e.to_string());
                self.push(Speaker::Hint, error_hint(&e));
            }
        }
    }

    pub fn history_len(&self) -> Option<usize> {
        self.router.as_ref().map(|r| r.state().len())
    }

    pub fn on_tick(&mut self) {
        if self.is_loading() {
            self.spinner_tick = self.spinner_tick.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::planner::{ChatMessage, ContextAssembler, ContextProviders, ModelBackend};
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl ModelBackend for EchoBackend {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
            Ok(format!("echo: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
        }
    }

    fn app() -> ChatApp {
        let assembler = ContextAssembler::new(None, ContextProviders::default());
        ChatApp::new(FlowRouter::new(assembler, Box::new(EchoBackend)))
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(app: &mut ChatApp, s: &str) {
        for c in s.chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_enter_submits_and_clears_input() {
        let mut app = app();
        type_str(&mut app, "hi");
        assert_eq!(app.handle_key(press(KeyCode::Enter)), Some("hi".to_string()));
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_enter_on_blank_input_does_nothing() {
        let mut app = app();
        type_str(&mut app, "   ");
        assert_eq!(app.handle_key(press(KeyCode::Enter)), None);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);

        let mut app = self::app();
        app.handle_key(press(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[test]
    fn test_input_char_limit() {
        let mut app = app();
        type_str(&mut app, &"x".repeat(INPUT_CHAR_LIMIT + 20));
        assert_eq!(app.input.chars().count(), INPUT_CHAR_LIMIT);
    }

    #[test]
    fn test_input_disabled_while_loading() {
        let mut app = app();
        let (_router, _) = app.begin_turn("hello".to_string()).unwrap();
        assert_eq!(app.phase, Phase::AwaitingResponse);

        type_str(&mut app, "more");
        assert!(app.input.is_empty());
        assert_eq!(app.handle_key(press(KeyCode::Enter)), None);
        assert!(app.begin_turn("again".to_string()).is_none());
    }

    #[test]
    fn test_condense_phase() {
        let mut app = app();
        app.begin_turn(" /Condense ".to_string()).unwrap();
        assert_eq!(app.phase, Phase::Condensing);
    }

    #[tokio::test]
    async fn test_full_turn_round_trip() {
        let mut app = app();
        let (mut router, line) = app.begin_turn("how's my day".to_string()).unwrap();
        let result = router.submit(&line).await;
        app.finish_turn(router, result);

        assert_eq!(app.phase, Phase::Idle);
        assert_eq!(app.history_len(), Some(2));
        let last = app.transcript.last().unwrap();
        assert_eq!(last.speaker, Speaker::Bot);
        assert_eq!(last.text, "echo: how's my day");
    }

    #[tokio::test]
    async fn test_error_turn_renders_error_and_hint() {
        let mut app = app();
        let (router, _) = app.begin_turn("hi".to_string()).unwrap();
        let err = PlannerError::Backend(BackendError::MalformedResponse("empty".into()));
        app.finish_turn(router, Err(err));

        assert!(!app.is_loading());
        let n = app.transcript.len();
        assert_eq!(app.transcript[n - 2].speaker, Speaker::Error);
        assert!(app.transcript[n - 2].text.contains("empty"));
        assert_eq!(app.transcript[n - 1].speaker, Speaker::Hint);
        assert_eq!(app.history_len(), Some(0));
    }

    #[test]
    fn test_error_hint_reflects_recoverability() {
        use crate::google_api::GoogleApiError;

        let auth = PlannerError::from(GoogleApiError::AuthExpired);
        assert_eq!(
            error_hint(&auth),
            "Action needed: Run 'obsidian-planner auth' to reconnect Google Calendar."
        );

        let outage = PlannerError::from(BackendError::Status {
            status: 503,
            body: "overloaded".into(),
        });
        assert!(error_hint(&outage).starts_with("Temporary failure. "));

        let garbage = PlannerError::from(BackendError::MalformedResponse("x".into()));
        assert_eq!(error_hint(&garbage), garbage.recovery_suggestion());
    }

    #[tokio::test]
    async fn test_auth_error_turn_shows_action_hint() {
        use crate::google_api::GoogleApiError;

        let mut app = app();
        let (router, _) = app.begin_turn("hi".to_string()).unwrap();
        app.finish_turn(router, Err(PlannerError::from(GoogleApiError::AuthExpired)));

        let hint = app.transcript.last().unwrap();
        assert_eq!(hint.speaker, Speaker::Hint);
        assert!(hint.text.starts_with("Action needed: "));
    }

    #[test]
    fn test_scroll_keys() {
        let mut app = app();
        app.handle_key(press(KeyCode::PageUp));
        app.handle_key(press(KeyCode::Up));
        assert_eq!(app.scroll_from_bottom, 11);
        app.handle_key(press(KeyCode::Down));
        assert_eq!(app.scroll_from_bottom, 10);
        app.handle_key(press(KeyCode::End));
        assert_eq!(app.scroll_from_bottom, 0);
    }
}
