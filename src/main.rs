use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use obsidian_planner_lib::google_api::{self, auth, calendar::GoogleCalendarClient, token_store};
use obsidian_planner_lib::ollama::OllamaClient;
use obsidian_planner_lib::planner::{CalendarSource, ContextAssembler, ContextProviders, FlowRouter};
use obsidian_planner_lib::types::Config;
use obsidian_planner_lib::{init_logging, state, tui};

#[derive(Debug, Parser)]
#[command(name = "obsidian-planner", version, about = "Plan your day with your calendar and a local model")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Message to send as the first turn of the chat.
    #[arg(value_name = "INITIAL_MESSAGE")]
    initial_message: Option<String>,

    /// Skip Google Calendar for this session.
    #[arg(long)]
    offline: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write ~/.obsidian-planner/config.json. Unset flags keep their current value.
    Configure {
        #[arg(long)]
        calendar_url: Option<String>,
        #[arg(long)]
        jira_email: Option<String>,
        #[arg(long)]
        jira_token: Option<String>,
        #[arg(long)]
        ollama_address: Option<String>,
        #[arg(long)]
        ollama_model: Option<String>,
        /// Persist offline mode (true or false).
        #[arg(long)]
        offline: Option<bool>,
    },
    /// Authorize read-only access to Google Calendar.
    Auth {
        /// Discard the stored token and ask for consent again.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Warning: file logging disabled: {}", e);
    }

    match cli.command {
        Some(Command::Configure {
            calendar_url,
            jira_email,
            jira_token,
            ollama_address,
            ollama_model,
            offline,
        }) => {
            let mut config = state::load_config_or_default()?;
            if let Some(v) = calendar_url {
                config.calendar_url = v;
            }
            if let Some(v) = jira_email {
                config.jira_email = v;
            }
            if let Some(v) = jira_token {
                config.jira_token = v;
            }
            if let Some(v) = ollama_address {
                config.ollama_address = v;
            }
            if let Some(v) = ollama_model {
                config.ollama_model = v;
            }
            if let Some(v) = offline {
                config.offline = v;
            }
            let path = state::write_config(&config)?;
            println!("Configuration saved to {}", path.display());
            Ok(())
        }
        Some(Command::Auth { force }) => {
            if force {
                token_store::delete_token_at(&google_api::token_path())?;
            }
            auth::ensure_authorized()
                .await
                .context("Google authorization failed")?;
            println!("Google Calendar authorized.");
            Ok(())
        }
        None => run_chat(cli.initial_message, cli.offline).await,
    }
}

async fn run_chat(initial: Option<String>, offline_flag: bool) -> Result<()> {
    let config: Config = state::load_config_or_default()?;
    let offline = offline_flag || config.offline;

    let calendar: Option<Box<dyn CalendarSource>> = if offline {
        log::info!("Offline mode: calendar disabled");
        None
    } else {
        auth::ensure_authorized()
            .await
            .context("Google authorization failed; run with --offline to skip the calendar")?;
        Some(Box::new(GoogleCalendarClient::new()))
    };

    let backend = OllamaClient::new(&config.ollama_address, &config.ollama_model)
        .context("Could not build the Ollama client")?;
    log::info!(
        "Starting chat with model {} at {}",
        backend.model(),
        config.ollama_address
    );

    let assembler = ContextAssembler::new(calendar, ContextProviders::default());
    let router = FlowRouter::new(assembler, Box::new(backend));

    tui::run(router, initial).await?;
    Ok(())
}
