use chrono::Utc;
use serde::{ Serialize, Deserialize };
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("a reply is still being generated for this conversation")]
    TurnPending,
    #[error("no reply is being generated for this conversation")]
    NoPendingTurn,
}

/// How a finished turn ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Resolved(String),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettledTurn {
    pub user: String,
    pub outcome: Outcome,
}

impl SettledTurn {
    /// Text shown as the assistant's side of the turn; for failed turns this is the diagnostic.
    pub fn reply_text(&self) -> &str {
        match &self.outcome {
            Outcome::Resolved(text) | Outcome::Failed(text) => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTurn {
    pub user: String,
    partial: String,
}

impl PendingTurn {
    /// `None` until the first fragment arrives.
    pub fn partial(&self) -> Option<&str> {
        if self.partial.is_empty() { None } else { Some(&self.partial) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    TurnStarted {
        user: String,
        at: i64,
    },
    TurnResolved {
        at: i64,
    },
    TurnFailed {
        message: String,
        at: i64,
    },
    Cleared {
        at: i64,
    },
}

/// One session's chat history. The pending turn has its own slot, so at most one
/// reply can be in flight at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    id: String,
    settled: Vec<SettledTurn>,
    pending: Option<PendingTurn>,
    events: Vec<ConversationEvent>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            settled: Vec::new(),
            pending: None,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settled_turns(&self) -> &[SettledTurn] {
        &self.settled
    }

    pub fn pending(&self) -> Option<&PendingTurn> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn events(&self) -> &[ConversationEvent] {
        &self.events
    }

    /// Number of turns including a pending one.
    pub fn len(&self) -> usize {
        self.settled.len() + usize::from(self.pending.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn begin_turn(&mut self, user: impl Into<String>) -> Result<(), ConversationError> {
        if self.pending.is_some() {
            return Err(ConversationError::TurnPending);
        }
        let user = user.into();
        self.events.push(ConversationEvent::TurnStarted {
            user: user.clone(),
            at: Utc::now().timestamp(),
        });
        self.pending = Some(PendingTurn { user, partial: String::new() });
        Ok(())
    }

    pub fn append_fragment(&mut self, fragment: &str) -> Result<(), ConversationError> {
        let pending = self.pending.as_mut().ok_or(ConversationError::NoPendingTurn)?;
        pending.partial.push_str(fragment);
        Ok(())
    }

    pub fn resolve(&mut self) -> Result<(), ConversationError> {
        let pending = self.pending.take().ok_or(ConversationError::NoPendingTurn)?;
        self.events.push(ConversationEvent::TurnResolved { at: Utc::now().timestamp() });
        self.settled.push(SettledTurn {
            user: pending.user,
            outcome: Outcome::Resolved(pending.partial),
        });
        Ok(())
    }

    /// Settles the pending turn with `message` in place of whatever was streamed so far.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), ConversationError> {
        let pending = self.pending.take().ok_or(ConversationError::NoPendingTurn)?;
        let message = message.into();
        self.events.push(ConversationEvent::TurnFailed {
            message: message.clone(),
            at: Utc::now().timestamp(),
        });
        self.settled.push(SettledTurn {
            user: pending.user,
            outcome: Outcome::Failed(message),
        });
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), ConversationError> {
        if self.pending.is_some() {
            return Err(ConversationError::TurnPending);
        }
        self.settled.clear();
        self.events.push(ConversationEvent::Cleared { at: Utc::now().timestamp() });
        Ok(())
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let mut turns: Vec<TurnView> = self.settled
            .iter()
            .map(|turn| TurnView {
                user: turn.user.clone(),
                assistant: Some(turn.reply_text().to_string()),
                state: match turn.outcome {
                    Outcome::Resolved(_) => TurnState::Resolved,
                    Outcome::Failed(_) => TurnState::Failed,
                },
            })
            .collect();

        if let Some(pending) = &self.pending {
            turns.push(TurnView {
                user: pending.user.clone(),
                assistant: pending.partial().map(str::to_string),
                state: TurnState::Pending,
            });
        }

        ConversationSnapshot { id: self.id.clone(), turns }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    Pending,
    Resolved,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnView {
    pub user: String,
    pub assistant: Option<String>,
    pub state: TurnState,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub id: String,
    pub turns: Vec<TurnView>,
}
