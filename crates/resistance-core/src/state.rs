use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Actor id used when the lobby timer starts the game.
pub const TIMER_ID: &str = "timer";
/// Actor id used for aborts the engine forces on its own.
pub const SYSTEM_ID: &str = "system";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    /// Over or removed; no further commands are accepted.
    Idle,
    /// Created, still accepting players.
    #[default]
    Initialized,
    /// The leader is proposing a team.
    Pick,
    /// Everyone is voting on the proposed team.
    Voting,
    /// The approved team is deciding the mission outcome.
    Mission,
}

impl GameState {
    pub fn is_running(self) -> bool {
        self != Self::Idle
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Initialized => "initialized",
            Self::Pick => "pick",
            Self::Voting => "voting",
            Self::Mission => "mission",
        };
        f.write_str(name)
    }
}

/// Externally invocable session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddPlayer,
    Start,
    Abort,
    Pick,
    DonePick,
    Vote,
    ExecuteMission,
    ShowPlayers,
    Info,
}

impl Operation {
    /// The single state this operation needs, if it is restricted to one.
    pub fn required_state(self) -> Option<GameState> {
        match self {
            Self::AddPlayer | Self::Start => Some(GameState::Initialized),
            Self::Pick | Self::DonePick => Some(GameState::Pick),
            Self::Vote => Some(GameState::Voting),
            Self::ExecuteMission => Some(GameState::Mission),
            Self::Abort | Self::ShowPlayers | Self::Info => None,
        }
    }

    fn rejection(self) -> &'static str {
        match self {
            Self::AddPlayer => "Cannot add player to a running game",
            Self::Start => "Game already started",
            Self::Pick => "Cannot pick now",
            Self::DonePick => "Cannot done picking now",
            Self::Vote => "Cannot vote now",
            Self::ExecuteMission => "Cannot run mission now",
            Self::Abort | Self::ShowPlayers | Self::Info => "Operation not allowed now",
        }
    }

    /// Check the state precondition. Idle sessions are reported as gone.
    pub fn check(self, state: GameState) -> Result<(), GameError> {
        if !state.is_running() {
            return Err(GameError::session_gone());
        }
        match self.required_state() {
            Some(required) if required != state => {
                Err(GameError::Validation(self.rejection().to_string()))
            },
            _ => Ok(()),
        }
    }
}
