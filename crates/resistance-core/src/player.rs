use serde::{Deserialize, Serialize};

/// Opaque identifier for a player, supplied by the front end. Unique within a
/// session.
pub type PlayerId = String;

/// Secret allegiance dealt at game start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spy,
    Resistance,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spy => write!(f, "spy"),
            Self::Resistance => write!(f, "resistance"),
        }
    }
}

/// A player seated in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// `None` until roles are dealt at start.
    #[serde(default)]
    pub role: Option<Role>,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: None,
        }
    }

    pub fn is_spy(&self) -> bool {
        self.role == Some(Role::Spy)
    }

    pub fn is_resistance(&self) -> bool {
        self.role == Some(Role::Resistance)
    }
}
