use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// One executed round: the approved team and their secret choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub round: usize,
    pub members: Vec<Player>,
    /// Every member starts at `true`; silent members, spies included, help
    /// the mission succeed.
    pub votes: BTreeMap<PlayerId, bool>,
    pub min_fail: usize,
    pub success: bool,
}

impl Mission {
    pub fn new(round: usize, members: Vec<Player>, min_fail: usize) -> Self {
        let votes = members.iter().map(|m| (m.id.clone(), true)).collect();
        Self {
            round,
            members,
            votes,
            min_fail,
            success: false,
        }
    }

    pub fn has_member(&self, player_id: &str) -> bool {
        self.members.iter().any(|m| m.id == player_id)
    }

    /// Record a member's choice. Returns false for non-members.
    pub fn record(&mut self, player_id: &str, succeed: bool) -> bool {
        match self.votes.get_mut(player_id) {
            Some(vote) => {
                *vote = succeed;
                true
            },
            None => false,
        }
    }

    pub fn fails(&self) -> usize {
        self.votes.values().filter(|v| !**v).count()
    }

    pub fn successes(&self) -> usize {
        self.votes.values().filter(|v| **v).count()
    }

    /// Settle the outcome: the mission succeeds while fails stay below the
    /// round's threshold.
    pub fn execute(&mut self) -> bool {
        self.success = self.fails() < self.min_fail;
        self.success
    }
}
