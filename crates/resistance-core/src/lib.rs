pub mod error;
pub mod events;
pub mod mission;
pub mod player;
pub mod round_config;
pub mod rules;
pub mod snapshot;
pub mod state;

pub use error::{ErrorKind, GameError};
pub use events::{CastVote, EventSink, GameEvent, NullSink};
pub use mission::Mission;
pub use player::{Player, PlayerId, Role};
pub use round_config::RoundConfig;
pub use snapshot::GameSnapshot;
pub use state::{GameState, Operation, SYSTEM_ID, TIMER_ID};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{Player, Role};

    /// Create `n` test players with ids `p1..=pn`.
    pub fn make_players(n: usize) -> Vec<Player> {
        (1..=n)
            .map(|i| Player::new(format!("p{i}"), format!("Player{i}")))
            .collect()
    }

    /// Create `n` players with roles already dealt: the first `spies` are
    /// spies, the rest resistance.
    pub fn make_dealt_players(n: usize, spies: usize) -> Vec<Player> {
        let mut players = make_players(n);
        for (i, p) in players.iter_mut().enumerate() {
            p.role = Some(if i < spies {
                Role::Spy
            } else {
                Role::Resistance
            });
        }
        players
    }

    /// Assert that roles partition the roster with exactly `spies` spies.
    pub fn assert_roles_dealt(players: &[Player], spies: usize) {
        let spy_count = players.iter().filter(|p| p.is_spy()).count();
        let resistance = players.iter().filter(|p| p.is_resistance()).count();
        assert_eq!(spy_count, spies, "wrong number of spies dealt");
        assert_eq!(
            spy_count + resistance,
            players.len(),
            "every player must hold exactly one role"
        );
    }
}
