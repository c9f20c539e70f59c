//! Inter-node command envelope.
//!
//! On the wire a command is `{"act": <code>, "id": ..., "data"?: ..., "newId"?: ...}`.

use serde::{Deserialize, Serialize};

/// Session server actions and their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Save,
    Destroy,
    DestroyAll,
    GetFailover,
    SaveFailover,
    DestroyFailover,
}

impl Action {
    pub fn code(self) -> u8 {
        match self {
            Self::Get => 1,
            Self::Save => 2,
            Self::Destroy => 3,
            Self::DestroyAll => 4,
            Self::GetFailover => 5,
            Self::SaveFailover => 6,
            Self::DestroyFailover => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Get),
            2 => Some(Self::Save),
            3 => Some(Self::Destroy),
            4 => Some(Self::DestroyAll),
            5 => Some(Self::GetFailover),
            6 => Some(Self::SaveFailover),
            7 => Some(Self::DestroyFailover),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Save => "save",
            Self::Destroy => "destroy",
            Self::DestroyAll => "destroy_all",
            Self::GetFailover => "get_failover",
            Self::SaveFailover => "save_failover",
            Self::DestroyFailover => "destroy_failover",
        }
    }
}

/// A command addressed to a session server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub act: u8,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, rename = "newId", skip_serializing_if = "Option::is_none")]
    pub new_id: Option<String>,
}

impl Command {
    fn new(action: Action, id: impl Into<String>) -> Self {
        Self {
            act: action.code(),
            id: id.into(),
            data: None,
            new_id: None,
        }
    }

    pub fn get(id: impl Into<String>) -> Self {
        Self::new(Action::Get, id)
    }

    pub fn save(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(Action::Save, id)
        }
    }

    pub fn destroy(id: impl Into<String>) -> Self {
        Self::new(Action::Destroy, id)
    }

    pub fn destroy_all() -> Self {
        Self::new(Action::DestroyAll, "")
    }

    pub fn get_failover(old_id: impl Into<String>, new_id: impl Into<String>) -> Self {
        Self {
            new_id: Some(new_id.into()),
            ..Self::new(Action::GetFailover, old_id)
        }
    }

    pub fn save_failover(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::new(Action::SaveFailover, id)
        }
    }

    pub fn destroy_failover(id: impl Into<String>) -> Self {
        Self::new(Action::DestroyFailover, id)
    }

    /// Returns the decoded action, or `None` for an unknown code.
    pub fn action(&self) -> Option<Action> {
        Action::from_code(self.act)
    }

    /// Rewrites the command into its failover counterpart.
    pub fn into_failover(mut self) -> Self {
        self.act = match self.action() {
            Some(Action::Get) => Action::GetFailover.code(),
            Some(Action::Save) => Action::SaveFailover.code(),
            Some(Action::Destroy) => Action::DestroyFailover.code(),
            _ => self.act,
        };
        self
    }
}

/// A session server's answer to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reply {
    /// Serialized record, or nothing when the session is unknown
    Record(Option<String>),
    /// Write/delete outcome
    Ack(bool),
    /// Number of sessions affected
    Count(usize),
    /// Unrecognised command
    Empty,
}

impl Reply {
    pub fn into_record(self) -> Option<String> {
        match self {
            Self::Record(payload) => payload,
            _ => None,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack(true))
    }

    pub fn count(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            _ => 0,
        }
    }
}
