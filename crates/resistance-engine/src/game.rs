use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use resistance_core::error::GameError;
use resistance_core::player::Player;
use resistance_core::snapshot::GameSnapshot;
use resistance_core::state::{GameState, Operation};

use crate::game_loop::{GameCommand, Reply};

/// Cloneable handle onto one session's control loop.
///
/// Every operation checks its state precondition against the state the loop
/// last published, then queues a request and waits for the loop's answer.
/// Once the session has ended, every operation fails with `NotFound`.
#[derive(Clone)]
pub struct Game {
    id: Arc<str>,
    commands: mpsc::UnboundedSender<GameCommand>,
    state: watch::Receiver<GameState>,
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Game {
    pub(crate) fn new(
        id: Arc<str>,
        commands: mpsc::UnboundedSender<GameCommand>,
        state: watch::Receiver<GameState>,
    ) -> Self {
        Self {
            id,
            commands,
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// State last published by the loop.
    ///
    /// The loop publishes a new phase only after its pacing pause, so this
    /// still reads the previous state for `pick_delay` after a successful
    /// `start` or `done_pick`.
    pub fn state(&self) -> GameState {
        *self.state.borrow()
    }

    /// True when both handles drive the same session loop.
    pub fn same_session(&self, other: &Game) -> bool {
        self.commands.same_channel(&other.commands)
    }

    async fn request<T>(
        &self,
        op: Operation,
        make: impl FnOnce(Reply<T>) -> GameCommand,
    ) -> Result<T, GameError> {
        op.check(self.state())?;
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| GameError::session_gone())?;
        rx.await.map_err(|_| GameError::session_gone())?
    }

    pub async fn add_player(&self, player: Player) -> Result<(), GameError> {
        self.request(Operation::AddPlayer, |reply| GameCommand::AddPlayer {
            player,
            reply,
        })
        .await
    }

    /// Start the game on behalf of a seated player.
    pub async fn start(&self, starter_id: &str) -> Result<(), GameError> {
        let starter_id = starter_id.to_string();
        self.request(Operation::Start, |reply| GameCommand::Start {
            starter_id,
            reply,
        })
        .await
    }

    pub async fn abort(&self, actor_id: &str) -> Result<(), GameError> {
        let actor_id = actor_id.to_string();
        self.request(Operation::Abort, |reply| GameCommand::Abort { actor_id, reply })
            .await
    }

    /// Toggle `target_id` in the leader's proposed team.
    pub async fn pick(&self, leader_id: &str, target_id: &str) -> Result<(), GameError> {
        let (leader_id, target_id) = (leader_id.to_string(), target_id.to_string());
        self.request(Operation::Pick, |reply| GameCommand::Pick {
            leader_id,
            target_id,
            reply,
        })
        .await
    }

    pub async fn done_pick(&self, leader_id: &str) -> Result<(), GameError> {
        let leader_id = leader_id.to_string();
        self.request(Operation::DonePick, |reply| GameCommand::DonePick {
            leader_id,
            reply,
        })
        .await
    }

    pub async fn vote(&self, player_id: &str, approve: bool) -> Result<(), GameError> {
        let player_id = player_id.to_string();
        self.request(Operation::Vote, |reply| GameCommand::Vote {
            player_id,
            approve,
            reply,
        })
        .await
    }

    pub async fn execute_mission(&self, player_id: &str, succeed: bool) -> Result<(), GameError> {
        let player_id = player_id.to_string();
        self.request(Operation::ExecuteMission, |reply| {
            GameCommand::ExecuteMission {
                player_id,
                succeed,
                reply,
            }
        })
        .await
    }

    /// Ask the loop to narrate the roster through the sink.
    pub async fn show_players(&self) -> Result<(), GameError> {
        self.request(Operation::ShowPlayers, |reply| GameCommand::ShowPlayers {
            reply,
        })
        .await
    }

    pub async fn info(&self) -> Result<GameSnapshot, GameError> {
        self.request(Operation::Info, |reply| GameCommand::Info { reply })
            .await
    }
}
