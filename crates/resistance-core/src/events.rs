use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::mission::Mission;
use crate::player::Player;
use crate::round_config::RoundConfig;
use crate::snapshot::GameSnapshot;

/// One team-vote ballot as announced when voting closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastVote {
    pub player: Player,
    pub approve: bool,
}

/// Everything a session narrates. Each variant maps to one [`EventSink`]
/// callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Created,
    /// `by` is `None` when the engine aborted on its own.
    Aborted {
        by: Option<Player>,
    },
    Started {
        starter: Option<Player>,
        config: Option<RoundConfig>,
        error: Option<GameError>,
    },
    PlayerAdded {
        player: Player,
        error: Option<GameError>,
    },
    PickStarted {
        leader: Player,
    },
    Picked {
        leader: Player,
        picked: Option<Player>,
        error: Option<GameError>,
    },
    Unpicked {
        leader: Player,
        unpicked: Player,
    },
    PickDone {
        leader: Player,
    },
    VotingStarted {
        leader: Player,
        picks: Vec<Player>,
    },
    Voted {
        voter: Option<Player>,
        approve: bool,
        error: Option<GameError>,
    },
    VotingDone {
        votes: Vec<CastVote>,
        majority: bool,
    },
    MissionStarted {
        members: Vec<Player>,
    },
    /// `success` is the value the player submitted, which for resistance
    /// members may differ from what was recorded.
    MissionExecuted {
        player: Player,
        success: bool,
    },
    MissionDone {
        mission: Mission,
    },
    SpyWin {
        message: String,
    },
    ResistanceWin {
        message: String,
    },
    PlayersShown {
        players: Vec<Player>,
        leader_index: Option<usize>,
        over: bool,
    },
}

impl GameEvent {
    /// Short stable name, used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Aborted { .. } => "aborted",
            Self::Started { .. } => "started",
            Self::PlayerAdded { .. } => "player_added",
            Self::PickStarted { .. } => "pick_started",
            Self::Picked { .. } => "picked",
            Self::Unpicked { .. } => "unpicked",
            Self::PickDone { .. } => "pick_done",
            Self::VotingStarted { .. } => "voting_started",
            Self::Voted { .. } => "voted",
            Self::VotingDone { .. } => "voting_done",
            Self::MissionStarted { .. } => "mission_started",
            Self::MissionExecuted { .. } => "mission_executed",
            Self::MissionDone { .. } => "mission_done",
            Self::SpyWin { .. } => "spy_win",
            Self::ResistanceWin { .. } => "resistance_win",
            Self::PlayersShown { .. } => "players_shown",
        }
    }

    /// True for the events after which the session is gone.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Aborted { .. } | Self::SpyWin { .. } | Self::ResistanceWin { .. }
        )
    }
}

/// Receiver of session narration. All callbacks default to no-ops so a sink
/// only implements what it renders. Callbacks for one session are invoked in
/// order from a single task and must not block for long.
#[allow(unused_variables)]
pub trait EventSink: Send + Sync + 'static {
    fn on_create(&self, game: &GameSnapshot) {}
    fn on_abort(&self, game: &GameSnapshot, by: Option<&Player>) {}
    fn on_start(
        &self,
        game: &GameSnapshot,
        starter: Option<&Player>,
        config: Option<&RoundConfig>,
        error: Option<&GameError>,
    ) {
    }
    fn on_add_player(&self, game: &GameSnapshot, player: &Player, error: Option<&GameError>) {}
    fn on_start_pick(&self, game: &GameSnapshot, leader: &Player) {}
    fn on_pick(
        &self,
        game: &GameSnapshot,
        leader: &Player,
        picked: Option<&Player>,
        error: Option<&GameError>,
    ) {
    }
    fn on_unpick(&self, game: &GameSnapshot, leader: &Player, unpicked: &Player) {}
    fn on_done_pick(&self, game: &GameSnapshot, leader: &Player) {}
    fn on_start_voting(&self, game: &GameSnapshot, leader: &Player, picks: &[Player]) {}
    fn on_vote(
        &self,
        game: &GameSnapshot,
        voter: Option<&Player>,
        approve: bool,
        error: Option<&GameError>,
    ) {
    }
    fn on_voting_done(&self, game: &GameSnapshot, votes: &[CastVote], majority: bool) {}
    fn on_start_mission(&self, game: &GameSnapshot, members: &[Player]) {}
    fn on_execute_mission(&self, game: &GameSnapshot, player: &Player, success: bool) {}
    fn on_mission_done(&self, game: &GameSnapshot, mission: &Mission) {}
    fn on_spy_win(&self, game: &GameSnapshot, message: &str) {}
    fn on_resistance_win(&self, game: &GameSnapshot, message: &str) {}
    fn on_show_players(
        &self,
        game: &GameSnapshot,
        players: &[Player],
        leader_index: Option<usize>,
        over: bool,
    ) {
    }

    /// Route an event to its callback. Sinks that want the raw event stream
    /// override this instead.
    fn on_event(&self, game: &GameSnapshot, event: &GameEvent) {
        match event {
            GameEvent::Created => self.on_create(game),
            GameEvent::Aborted { by } => self.on_abort(game, by.as_ref()),
            GameEvent::Started {
                starter,
                config,
                error,
            } => self.on_start(game, starter.as_ref(), config.as_ref(), error.as_ref()),
            GameEvent::PlayerAdded { player, error } => {
                self.on_add_player(game, player, error.as_ref())
            },
            GameEvent::PickStarted { leader } => self.on_start_pick(game, leader),
            GameEvent::Picked {
                leader,
                picked,
                error,
            } => self.on_pick(game, leader, picked.as_ref(), error.as_ref()),
            GameEvent::Unpicked { leader, unpicked } => self.on_unpick(game, leader, unpicked),
            GameEvent::PickDone { leader } => self.on_done_pick(game, leader),
            GameEvent::VotingStarted { leader, picks } => {
                self.on_start_voting(game, leader, picks)
            },
            GameEvent::Voted {
                voter,
                approve,
                error,
            } => self.on_vote(game, voter.as_ref(), *approve, error.as_ref()),
            GameEvent::VotingDone { votes, majority } => {
                self.on_voting_done(game, votes, *majority)
            },
            GameEvent::MissionStarted { members } => self.on_start_mission(game, members),
            GameEvent::MissionExecuted { player, success } => {
                self.on_execute_mission(game, player, *success)
            },
            GameEvent::MissionDone { mission } => self.on_mission_done(game, mission),
            GameEvent::SpyWin { message } => self.on_spy_win(game, message),
            GameEvent::ResistanceWin { message } => self.on_resistance_win(game, message),
            GameEvent::PlayersShown {
                players,
                leader_index,
                over,
            } => self.on_show_players(game, players, *leader_index, *over),
        }
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::state::GameState;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, s: impl Into<String>) {
            self.calls.lock().unwrap().push(s.into());
        }
    }

    impl EventSink for Recorder {
        fn on_start_pick(&self, _game: &GameSnapshot, leader: &Player) {
            self.push(format!("pick:{}", leader.id));
        }

        fn on_vote(
            &self,
            _game: &GameSnapshot,
            voter: Option<&Player>,
            approve: bool,
            error: Option<&GameError>,
        ) {
            let who = voter.map_or("?", |p| p.id.as_str());
            self.push(format!("vote:{who}:{approve}:{}", error.is_some()));
        }

        fn on_spy_win(&self, _game: &GameSnapshot, message: &str) {
            self.push(format!("spy:{message}"));
        }
    }

    fn snapshot() -> GameSnapshot {
        GameSnapshot {
            id: "g".to_string(),
            state: GameState::Pick,
            players: Vec::new(),
            round: 1,
            voting_round: 1,
            leader_index: Some(0),
            picks: Vec::new(),
            votes: BTreeMap::new(),
            missions: Vec::new(),
            config: None,
            spy_won_by_rejection: false,
        }
    }

    fn alice() -> Player {
        Player::new("a", "Alice")
    }

    #[test]
    fn on_event_routes_to_callbacks() {
        let sink = Recorder::default();
        let snap = snapshot();
        sink.on_event(&snap, &GameEvent::PickStarted { leader: alice() });
        sink.on_event(
            &snap,
            &GameEvent::Voted {
                voter: None,
                approve: false,
                error: Some(GameError::NotFound("Player not found".to_string())),
            },
        );
        sink.on_event(
            &snap,
            &GameEvent::SpyWin {
                message: "stalled".to_string(),
            },
        );
        // Unimplemented callbacks fall through to the no-op defaults.
        sink.on_event(&snap, &GameEvent::Created);

        let calls = sink.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["pick:a", "vote:?:false:true", "spy:stalled"]
        );
    }

    #[test]
    fn terminal_events() {
        assert!(GameEvent::Aborted { by: None }.is_terminal());
        assert!(
            GameEvent::ResistanceWin {
                message: String::new()
            }
            .is_terminal()
        );
        assert!(!GameEvent::PickDone { leader: alice() }.is_terminal());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(GameEvent::PickDone { leader: alice() }).unwrap();
        assert_eq!(json["type"], "pick_done");
        assert_eq!(json["leader"]["id"], "a");
        assert_eq!(GameEvent::Created.name(), "created");
    }
}
