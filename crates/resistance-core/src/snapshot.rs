use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mission::Mission;
use crate::player::{Player, PlayerId};
use crate::round_config::RoundConfig;
use crate::rules::Scoreboard;
use crate::state::GameState;

/// Point-in-time copy of a session, taken by its control loop. Event sinks
/// and `info` callers read this; it never feeds back into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub id: String,
    pub state: GameState,
    /// Seating order; fixed at start after the shuffle.
    pub players: Vec<Player>,
    pub round: usize,
    pub voting_round: usize,
    /// `None` until the first pick phase.
    pub leader_index: Option<usize>,
    /// Proposed team, in pick order.
    pub picks: Vec<Player>,
    /// Team-vote ballots cast so far in the current vote.
    pub votes: BTreeMap<PlayerId, bool>,
    pub missions: Vec<Mission>,
    pub config: Option<RoundConfig>,
    pub spy_won_by_rejection: bool,
}

impl GameSnapshot {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn find_player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn leader(&self) -> Option<&Player> {
        self.leader_index.and_then(|i| self.players.get(i))
    }

    pub fn spies(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_spy())
    }

    /// Team size the current round requires.
    pub fn required_picks(&self) -> Option<usize> {
        self.config.and_then(|c| c.members_for_round(self.round))
    }

    pub fn current_mission(&self) -> Option<&Mission> {
        if self.state != GameState::Mission {
            return None;
        }
        self.missions.last()
    }

    /// `None` before the game has started.
    pub fn scoreboard(&self) -> Option<Scoreboard> {
        let config = self.config?;
        Some(
            Scoreboard::from_missions(&self.missions, config.total_rounds)
                .with_rejection(self.spy_won_by_rejection),
        )
    }

    pub fn spy_win(&self) -> bool {
        self.scoreboard().is_some_and(|b| b.spy_win())
    }

    pub fn resistance_win(&self) -> bool {
        self.scoreboard().is_some_and(|b| b.resistance_win())
    }

    pub fn over(&self) -> bool {
        self.spy_win() || self.resistance_win()
    }
}
