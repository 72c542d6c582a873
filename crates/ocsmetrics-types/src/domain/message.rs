use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::SessionId;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Bot,
    Participant,
    System,
}

impl AuthorRole {
    /// Map an upstream role string (`user`, `assistant`, `system`) to a role.
    ///
    /// Unknown roles are treated as system messages so they never count
    /// towards participant statistics.
    pub fn from_wire(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" | "participant" | "human" => AuthorRole::Participant,
            "assistant" | "bot" | "ai" => AuthorRole::Bot,
            _ => AuthorRole::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: SessionId,
    pub role: AuthorRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_participant(&self) -> bool {
        self.role == AuthorRole::Participant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_mapping() {
        assert_eq!(AuthorRole::from_wire("user"), AuthorRole::Participant);
        assert_eq!(AuthorRole::from_wire("Assistant"), AuthorRole::Bot);
        assert_eq!(AuthorRole::from_wire("system"), AuthorRole::System);
        assert_eq!(AuthorRole::from_wire("tool"), AuthorRole::System);
    }
}
