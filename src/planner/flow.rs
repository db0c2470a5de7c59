//! Flow routing: pick chat / plan-generation / condense for an input, build
//! the message list for the model, and fold the reply back into history.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use super::context::ContextAssembler;
use super::conversation::{ConversationState, Message, PlannerInput, Role};
use super::prompts::{PromptTemplate, CHAT_TEMPLATE, CONDENSE_TEMPLATE, PLAN_TEMPLATE};
use crate::error::{BackendError, PlannerError};

/// Literal command that compacts history.
pub const CONDENSE_COMMAND: &str = "/condense";

/// Substring that switches a turn to plan generation.
pub const GENERATE_TRIGGER: &str = "generate";

/// Upper bound on history characters sent with a condense request. Oldest
/// messages are left out first; the newest message is always sent.
pub const MAX_CONDENSE_CHARS: usize = 32_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Chat,
    GeneratePlan,
    Condense,
}

impl Flow {
    pub fn template(&self) -> PromptTemplate {
        match self {
            Flow::Chat => CHAT_TEMPLATE,
            Flow::GeneratePlan => PLAN_TEMPLATE,
            Flow::Condense => CONDENSE_TEMPLATE,
        }
    }
}

/// Classify a raw input line. Total: every input maps to a flow.
pub fn classify(input: &str) -> Flow {
    let folded = input.to_lowercase();
    if folded.trim() == CONDENSE_COMMAND {
        Flow::Condense
    } else if folded.contains(GENERATE_TRIGGER) {
        Flow::GeneratePlan
    } else {
        Flow::Chat
    }
}

/// Roles as the model backend sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Model,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Model => ChatRole::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.into(),
            content: msg.content.clone(),
        }
    }
}

/// Text generation over a list of role-tagged messages.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;
}

/// A fully assembled request, ready for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub flow: Flow,
    pub messages: Vec<ChatMessage>,
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub flow: Flow,
    pub reply: String,
}

/// System message, then history, then (optionally) the new user message.
pub fn build_messages(system: String, input: &PlannerInput<'_>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(input.history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(input.history.iter().map(ChatMessage::from));
    if let Some(prompt) = input.user_prompt {
        messages.push(ChatMessage::from(&Message::user(prompt)));
    }
    messages
}

/// Newest-first slice of history fitting in `budget` characters, returned
/// oldest-first. Always keeps at least the newest message.
fn condense_window(history: &[Message], budget: usize) -> &[Message] {
    let mut used = 0usize;
    let mut start = history.len();
    while start > 0 {
        let len = history[start - 1].content.chars().count();
        if start < history.len() && used + len > budget {
            break;
        }
        used += len;
        start -= 1;
    }
    &history[start..]
}

/// Owns the conversation and its collaborators; one turn at a time.
pub struct FlowRouter {
    assembler: ContextAssembler,
    backend: Box<dyn ModelBackend>,
    state: ConversationState,
}

impl FlowRouter {
    pub fn new(assembler: ContextAssembler, backend: Box<dyn ModelBackend>) -> Self {
        Self {
            assembler,
            backend,
            state: ConversationState::new(),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Classify `input` and assemble the backend request for it, using
    /// today's calendar.
    pub async fn route(&self, input: &str) -> Result<BackendCall, PlannerError> {
        self.route_for_day(input, Local::now().date_naive()).await
    }

    pub async fn route_for_day(&self, input: &str, day: NaiveDate) -> Result<BackendCall, PlannerError> {
        let flow = classify(input);
        let history = self.state.messages();

        let messages = match flow {
            Flow::Condense => {
                let window = condense_window(history, MAX_CONDENSE_CHARS);
                if window.len() < history.len() {
                    log::warn!(
                        "Condense: history too long, leaving out the {} oldest of {} messages",
                        history.len() - window.len(),
                        history.len()
                    );
                }
                let planner_input = PlannerInput {
                    user_prompt: None,
                    history: window,
                };
                build_messages(CONDENSE_TEMPLATE.text.to_string(), &planner_input)
            }
            Flow::Chat | Flow::GeneratePlan => {
                let ctx = self.assembler.fetch_context(day).await?;
                let planner_input = PlannerInput {
                    user_prompt: Some(input),
                    history,
                };
                build_messages(flow.template().render(&ctx), &planner_input)
            }
        };

        Ok(BackendCall { flow, messages })
    }

    /// Run one turn against today's calendar.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome, PlannerError> {
        self.submit_for_day(input, Local::now().date_naive()).await
    }

    /// Run one turn.
    ///
    /// On success the user message and the reply are appended (or, for
    /// condense, the history is replaced by the summary). On failure the
    /// history is left exactly as it was.
    pub async fn submit_for_day(&mut self, input: &str, day: NaiveDate) -> Result<TurnOutcome, PlannerError> {
        let call = self.route_for_day(input, day).await?;
        log::info!(
            "Flow {:?}: sending {} messages ({} history)",
            call.flow,
            call.messages.len(),
            self.state.len()
        );

        let reply = self.backend.generate(&call.messages).await?;

        match call.flow {
            Flow::Condense => {
                let before = self.state.len();
                self.state.condense(&reply);
                log::info!("Condensed {} messages into a summary", before);
            }
            Flow::Chat | Flow::GeneratePlan => {
                self.state.append(Message::user(input));
                self.state.append(Message::model(reply.clone()));
            }
        }

        Ok(TurnOutcome {
            flow: call.flow,
            reply,
        })
    }
}
