//! Full-screen chat shell.
//!
//! Key presses and ticks arrive from a blocking reader thread; model turns
//! run on the tokio runtime and report back through the same channel.

pub mod app;
pub mod ui;

use std::any::Any;
use std::io::{self, Stdout};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures_util::FutureExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use crate::error::PlannerError;
use crate::planner::{FlowRouter, TurnOutcome};

pub use app::ChatApp;

const TICK_RATE: Duration = Duration::from_millis(120);

type Tui = Terminal<CrosstermBackend<Stdout>>;

enum AppEvent {
    Key(KeyEvent),
    Tick,
    TurnDone(FlowRouter, Result<TurnOutcome, PlannerError>),
}

fn setup_terminal() -> io::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e);
    }
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Tui) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Forward terminal input to the loop. Exits once the receiver is dropped.
fn spawn_input_reader(tx: mpsc::UnboundedSender<AppEvent>) {
    std::thread::spawn(move || loop {
        let next = match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => AppEvent::Key(key),
                Ok(_) => continue,
                Err(e) => {
                    log::error!("Terminal read failed: {}", e);
                    return;
                }
            },
            Ok(false) => AppEvent::Tick,
            Err(e) => {
                log::error!("Terminal poll failed: {}", e);
                return;
            }
        };
        if tx.send(next).is_err() {
            return;
        }
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Submit one turn. A panic inside the turn becomes `PlannerError::Aborted`
/// so the router always comes back to the shell; history is only touched
/// after a reply, so it is unchanged in that case.
async fn run_turn(router: &mut FlowRouter, line: &str) -> Result<TurnOutcome, PlannerError> {
    match AssertUnwindSafe(router.submit(line)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            log::error!("Turn panicked: {}", msg);
            Err(PlannerError::Aborted(msg))
        }
    }
}

fn start_turn(app: &mut ChatApp, line: String, tx: &mpsc::UnboundedSender<AppEvent>) {
    let Some((mut router, line)) = app.begin_turn(line) else {
        return;
    };
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = run_turn(&mut router, &line).await;
        let _ = tx.send(AppEvent::TurnDone(router, result));
    });
}

/// Run the chat shell until the user quits. `initial` is submitted as the
/// first turn when present.
pub async fn run(router: FlowRouter, initial: Option<String>) -> io::Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, router, initial).await;
    let restored = restore_terminal(&mut terminal);
    result.and(restored)
}

async fn event_loop(
    terminal: &mut Tui,
    router: FlowRouter,
    initial: Option<String>,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_input_reader(tx.clone());

    let mut app = ChatApp::new(router);
    if let Some(line) = initial.filter(|l| !l.trim().is_empty()) {
        start_turn(&mut app, line, &tx);
    }

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        let Some(event) = rx.recv().await else {
            break;
        };
        match event {
            AppEvent::Key(key) => {
                if let Some(line) = app.handle_key(key) {
                    start_turn(&mut app, line, &tx);
                }
            }
            AppEvent::Tick => app.on_tick(),
            AppEvent::TurnDone(router, result) => {
                app.finish_turn(router, result);
                log::debug!("History now holds {:?} messages", app.history_len());
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::planner::{ChatMessage, ContextAssembler, ContextProviders, ModelBackend};
    use async_trait::async_trait;

    struct PanickingBackend;

    #[async_trait]
    impl ModelBackend for PanickingBackend {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, BackendError> {
            panic!("backend blew up");
        }
    }

    fn router() -> FlowRouter {
        let assembler = ContextAssembler::new(None, ContextProviders::default());
        FlowRouter::new(assembler, Box::new(PanickingBackend))
    }

    #[tokio::test]
    async fn test_panicking_turn_returns_router_and_error() {
        let mut router = router();
        let result = run_turn(&mut router, "hello").await;

        match result {
            Err(PlannerError::Aborted(msg)) => assert_eq!(msg, "backend blew up"),
            other => panic!("expected Aborted, got {:?}", other),
        }
        assert!(router.state().is_empty());
    }

    #[tokio::test]
    async fn test_shell_recovers_after_panicking_turn() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = ChatApp::new(router());

        start_turn(&mut app, "hello".to_string(), &tx);
        assert!(app.is_loading());

        match rx.recv().await {
            Some(AppEvent::TurnDone(router, result)) => {
                assert!(result.is_err());
                app.finish_turn(router, result);
            }
            _ => panic!("expected TurnDone"),
        }

        assert!(!app.is_loading());
        assert_eq!(app.history_len(), Some(0));
        assert!(app.begin_turn("again".to_string()).is_some());
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "panic with non-string payload");
    }
}
