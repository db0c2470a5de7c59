//! Rolling chat history for the current session.

/// Prefix of the single message left behind by a condense.
pub const SUMMARY_PREFIX: &str = "Summary of previous conversation: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Map an external role string onto [`Role`].
    ///
    /// `model`, `bot` and `assistant` all mean the model. Anything else has no
    /// counterpart and yields `None`; callers drop those messages. This is a
    /// lossy normalization, not an error.
    pub fn normalize(raw: &str) -> Option<Role> {
        match raw {
            "user" => Some(Role::User),
            "model" | "bot" | "assistant" => Some(Role::Model),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }

    /// Build a message from an external role string, or `None` if the role
    /// is not one the planner understands.
    pub fn from_raw(role: &str, content: impl Into<String>) -> Option<Self> {
        match Role::normalize(role) {
            Some(role) => Some(Self {
                role,
                content: content.into(),
            }),
            None => {
                log::debug!("Dropping history message with unrecognized role '{}'", role);
                None
            }
        }
    }
}

/// Per-call bundle handed to a flow template: the new prompt (absent for
/// condense) and the history it follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerInput<'a> {
    pub user_prompt: Option<&'a str>,
    pub history: &'a [Message],
}

/// Ordered, append-only transcript of user and model messages.
///
/// No length cap; `/condense` is the only compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the whole transcript with one model-authored summary.
    pub fn condense(&mut self, summary: &str) {
        self.messages = vec![Message::model(format!("{}{}", SUMMARY_PREFIX, summary))];
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
