//! Conversation state and prompt assembly.
//!
//! - conversation: the session transcript and role normalization
//! - context: the per-call goals / calendar / tickets / tasks snapshot
//! - prompts: system prompt templates
//! - flow: input classification and the turn loop against a model backend

pub mod context;
pub mod conversation;
pub mod flow;
pub mod prompts;

pub use context::{CalendarSource, ContextAssembler, ContextProviders, PlannerContext};
pub use conversation::{ConversationState, Message, PlannerInput, Role};
pub use flow::{classify, BackendCall, ChatMessage, ChatRole, Flow, FlowRouter, ModelBackend, TurnOutcome};
