//! Pure game arithmetic: team-vote tally, win evaluation, and role dealing.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::mission::Mission;
use crate::player::{Player, Role};

/// Counted team-vote ballots. Players who never voted count as rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub approve: usize,
    pub reject: usize,
    pub silent: usize,
}

impl VoteTally {
    pub fn count<'a>(ballots: impl IntoIterator<Item = &'a bool>, player_count: usize) -> Self {
        let (mut approve, mut reject) = (0, 0);
        for &ballot in ballots {
            if ballot {
                approve += 1;
            } else {
                reject += 1;
            }
        }
        Self {
            approve,
            reject,
            silent: player_count.saturating_sub(approve + reject),
        }
    }

    /// `approve - reject - silent`.
    pub fn score(&self) -> i64 {
        self.approve as i64 - self.reject as i64 - self.silent as i64
    }

    pub fn majority(&self) -> bool {
        self.score() > 0
    }
}

/// Which side took the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Spies,
    Resistance,
}

/// Mission results so far, measured against the rounds still to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub succeeded: usize,
    pub failed: usize,
    pub total_rounds: usize,
    pub spy_won_by_rejection: bool,
}

impl Scoreboard {
    pub fn from_missions(missions: &[Mission], total_rounds: usize) -> Self {
        let succeeded = missions.iter().filter(|m| m.success).count();
        Self {
            succeeded,
            failed: missions.len() - succeeded,
            total_rounds,
            spy_won_by_rejection: false,
        }
    }

    pub fn with_rejection(mut self, spy_won_by_rejection: bool) -> Self {
        self.spy_won_by_rejection = spy_won_by_rejection;
        self
    }

    pub fn played(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn remaining(&self) -> usize {
        self.total_rounds.saturating_sub(self.played())
    }

    /// Spies win once their failures exceed anything the resistance can still
    /// offset, or immediately after a stalled team vote.
    pub fn spy_win(&self) -> bool {
        self.spy_won_by_rejection || self.failed > self.succeeded + self.remaining()
    }

    pub fn resistance_win(&self) -> bool {
        !self.spy_won_by_rejection && self.succeeded > self.failed + self.remaining()
    }

    pub fn winner(&self) -> Option<Winner> {
        if self.spy_win() {
            Some(Winner::Spies)
        } else if self.resistance_win() {
            Some(Winner::Resistance)
        } else {
            None
        }
    }
}

/// Shuffle the seating order uniformly (Fisher-Yates).
pub fn shuffle_players<R: Rng + ?Sized>(players: &mut [Player], rng: &mut R) {
    players.shuffle(rng);
}

/// Mark `spy_count` uniformly chosen players as spies and everyone else as
/// resistance.
pub fn assign_roles<R: Rng + ?Sized>(players: &mut [Player], spy_count: usize, rng: &mut R) {
    for player in players.iter_mut() {
        player.role = Some(Role::Resistance);
    }
    let mut remaining = spy_count.min(players.len());
    while remaining > 0 {
        let x = rng.random_range(0..players.len());
        if players[x].is_spy() {
            continue;
        }
        players[x].role = Some(Role::Spy);
        remaining -= 1;
    }
}

/// Shuffle the roster, then deal roles.
pub fn deal_roles<R: Rng + ?Sized>(players: &mut [Player], spy_count: usize, rng: &mut R) {
    shuffle_players(players, rng);
    assign_roles(players, spy_count, rng);
}
