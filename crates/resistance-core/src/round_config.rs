use serde::{Deserialize, Serialize};

/// Every supported table plays five missions.
pub const TOTAL_ROUNDS: usize = 5;

/// Per-roster-size game parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    pub player_count: usize,
    pub spy_count: usize,
    /// Team size the leader must propose, indexed by `round - 1`.
    pub members_per_round: [usize; TOTAL_ROUNDS],
    /// Fails needed to sink the mission, indexed by `round - 1`.
    pub fail_threshold_per_round: [usize; TOTAL_ROUNDS],
    pub total_rounds: usize,
}

const fn entry(
    player_count: usize,
    spy_count: usize,
    members_per_round: [usize; TOTAL_ROUNDS],
    fail_threshold_per_round: [usize; TOTAL_ROUNDS],
) -> RoundConfig {
    RoundConfig {
        player_count,
        spy_count,
        members_per_round,
        fail_threshold_per_round,
        total_rounds: TOTAL_ROUNDS,
    }
}

/// Static round table. The single-player entry exists for local debugging and
/// is only reachable when the engine's minimum roster is lowered to 1.
const ROUND_TABLE: &[RoundConfig] = &[
    entry(1, 1, [1, 1, 1, 1, 1], [1, 1, 1, 2, 1]),
    entry(5, 2, [2, 3, 2, 3, 3], [1, 1, 1, 1, 1]),
    entry(6, 2, [2, 3, 4, 3, 4], [1, 1, 1, 1, 1]),
    entry(7, 3, [2, 3, 3, 4, 4], [1, 1, 1, 2, 1]),
    entry(8, 3, [3, 4, 4, 5, 5], [1, 1, 1, 2, 1]),
    entry(9, 3, [3, 4, 4, 5, 5], [1, 1, 1, 2, 1]),
    entry(10, 4, [3, 4, 4, 5, 5], [1, 1, 1, 2, 1]),
];

impl RoundConfig {
    /// Look up the configuration for a roster size.
    pub fn lookup(player_count: usize) -> Option<RoundConfig> {
        ROUND_TABLE
            .iter()
            .find(|c| c.player_count == player_count)
            .copied()
    }

    /// All roster sizes present in the table, ascending.
    pub fn supported_player_counts() -> impl Iterator<Item = usize> {
        ROUND_TABLE.iter().map(|c| c.player_count)
    }

    /// Team size for a 1-based round number.
    pub fn members_for_round(&self, round: usize) -> Option<usize> {
        round
            .checked_sub(1)
            .and_then(|i| self.members_per_round.get(i))
            .copied()
    }

    /// Fail threshold for a 1-based round number.
    pub fn fail_threshold_for_round(&self, round: usize) -> Option<usize> {
        round
            .checked_sub(1)
            .and_then(|i| self.fail_threshold_per_round.get(i))
            .copied()
    }

    pub fn resistance_count(&self) -> usize {
        self.player_count - self.spy_count
    }

    /// Team sizes per round, with `*` marking rounds that need two fails.
    pub fn overview(&self) -> Vec<String> {
        self.members_per_round
            .iter()
            .zip(self.fail_threshold_per_round.iter())
            .map(|(&members, &fails)| {
                if fails > 1 {
                    format!("{members}*")
                } else {
                    members.to_string()
                }
            })
            .collect()
    }
}
