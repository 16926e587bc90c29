//! Stock [`EventSink`] implementations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use resistance_core::error::GameError;
use resistance_core::events::{CastVote, EventSink, GameEvent};
use resistance_core::mission::Mission;
use resistance_core::player::Player;
use resistance_core::round_config::RoundConfig;
use resistance_core::snapshot::GameSnapshot;

/// Narrates every event to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

fn name_of(player: Option<&Player>) -> &str {
    player.map_or("-", |p| p.display_name.as_str())
}

fn names(players: &[Player]) -> String {
    players
        .iter()
        .map(|p| p.display_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl EventSink for TracingSink {
    fn on_create(&self, game: &GameSnapshot) {
        info!(session = %game.id, "Game created, waiting for players");
    }

    fn on_abort(&self, game: &GameSnapshot, by: Option<&Player>) {
        info!(session = %game.id, by = name_of(by), "Game aborted");
    }

    fn on_start(
        &self,
        game: &GameSnapshot,
        starter: Option<&Player>,
        config: Option<&RoundConfig>,
        error: Option<&GameError>,
    ) {
        if let Some(err) = error {
            info!(session = %game.id, starter = name_of(starter), %err, "Start rejected");
            return;
        }
        if let Some(config) = config {
            info!(
                session = %game.id,
                starter = name_of(starter),
                players = config.player_count,
                spies = config.spy_count,
                rounds = %config.overview().join(" "),
                "Game started"
            );
        }
    }

    fn on_add_player(&self, game: &GameSnapshot, player: &Player, error: Option<&GameError>) {
        match error {
            Some(err) => info!(session = %game.id, player = %player.display_name, %err, "Join rejected"),
            None => info!(
                session = %game.id,
                player = %player.display_name,
                count = game.player_count(),
                "Player joined"
            ),
        }
    }

    fn on_start_pick(&self, game: &GameSnapshot, leader: &Player) {
        info!(
            session = %game.id,
            round = game.round,
            voting_round = game.voting_round,
            leader = %leader.display_name,
            team_size = game.required_picks().unwrap_or(0),
            "Leader is choosing a team"
        );
    }

    fn on_pick(
        &self,
        game: &GameSnapshot,
        leader: &Player,
        picked: Option<&Player>,
        error: Option<&GameError>,
    ) {
        match error {
            Some(err) => info!(session = %game.id, leader = %leader.display_name, %err, "Pick rejected"),
            None => info!(
                session = %game.id,
                leader = %leader.display_name,
                picked = name_of(picked),
                "Player picked"
            ),
        }
    }

    fn on_unpick(&self, game: &GameSnapshot, leader: &Player, unpicked: &Player) {
        info!(
            session = %game.id,
            leader = %leader.display_name,
            unpicked = %unpicked.display_name,
            "Player unpicked"
        );
    }

    fn on_done_pick(&self, game: &GameSnapshot, leader: &Player) {
        info!(session = %game.id, leader = %leader.display_name, team = %names(&game.picks), "Team proposed");
    }

    fn on_start_voting(&self, game: &GameSnapshot, leader: &Player, picks: &[Player]) {
        info!(
            session = %game.id,
            leader = %leader.display_name,
            team = %names(picks),
            "Voting opened"
        );
    }

    fn on_vote(
        &self,
        game: &GameSnapshot,
        voter: Option<&Player>,
        approve: bool,
        error: Option<&GameError>,
    ) {
        match error {
            Some(err) => info!(session = %game.id, %err, "Vote rejected"),
            None => info!(session = %game.id, voter = name_of(voter), approve, "Vote cast"),
        }
    }

    fn on_voting_done(&self, game: &GameSnapshot, votes: &[CastVote], majority: bool) {
        let ballots = votes
            .iter()
            .map(|v| format!("{}={}", v.player.display_name, if v.approve { "yes" } else { "no" }))
            .collect::<Vec<_>>()
            .join(", ");
        info!(session = %game.id, %ballots, majority, "Voting closed");
    }

    fn on_start_mission(&self, game: &GameSnapshot, members: &[Player]) {
        info!(session = %game.id, round = game.round, team = %names(members), "Mission started");
    }

    fn on_execute_mission(&self, game: &GameSnapshot, player: &Player, _success: bool) {
        // The submitted choice is secret.
        info!(session = %game.id, player = %player.display_name, "Mission choice submitted");
    }

    fn on_mission_done(&self, game: &GameSnapshot, mission: &Mission) {
        info!(
            session = %game.id,
            round = mission.round,
            fails = mission.fails(),
            success = mission.success,
            "Mission finished"
        );
    }

    fn on_spy_win(&self, game: &GameSnapshot, message: &str) {
        let spies: Vec<Player> = game.spies().cloned().collect();
        info!(session = %game.id, spies = %names(&spies), "{message}");
    }

    fn on_resistance_win(&self, game: &GameSnapshot, message: &str) {
        let spies: Vec<Player> = game.spies().cloned().collect();
        info!(session = %game.id, spies = %names(&spies), "{message}");
    }

    fn on_show_players(
        &self,
        game: &GameSnapshot,
        players: &[Player],
        leader_index: Option<usize>,
        over: bool,
    ) {
        let leader = leader_index.and_then(|i| players.get(i));
        info!(
            session = %game.id,
            players = %names(players),
            leader = name_of(leader),
            over,
            "Players"
        );
    }
}

/// Forwards every `(snapshot, event)` pair into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(GameSnapshot, GameEvent)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(GameSnapshot, GameEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, game: &GameSnapshot, event: &GameEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send((game.clone(), event.clone()));
    }
}

/// Fans each event out to several sinks, in order.
#[derive(Default, Clone)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for MultiSink {
    fn on_event(&self, game: &GameSnapshot, event: &GameEvent) {
        for sink in &self.sinks {
            sink.on_event(game, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use resistance_core::state::GameState;
    use resistance_core::test_helpers::make_dealt_players;

    fn snapshot() -> GameSnapshot {
        GameSnapshot {
            id: "s".to_string(),
            state: GameState::Voting,
            players: make_dealt_players(5, 2),
            round: 1,
            voting_round: 1,
            leader_index: Some(0),
            picks: Vec::new(),
            votes: BTreeMap::new(),
            missions: Vec::new(),
            config: RoundConfig::lookup(5),
            spy_won_by_rejection: false,
        }
    }

    #[test]
    fn channel_sink_forwards_pairs() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_event(&snapshot(), &GameEvent::Created);
        let (snap, event) = rx.try_recv().unwrap();
        assert_eq!(snap.id, "s");
        assert_eq!(event, GameEvent::Created);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_event(&snapshot(), &GameEvent::Created);
    }

    #[test]
    fn multi_sink_fans_out_in_order() {
        let (a, mut rx_a) = ChannelSink::new();
        let (b, mut rx_b) = ChannelSink::new();
        let multi = MultiSink::new()
            .with(Arc::new(a))
            .with(Arc::new(TracingSink))
            .with(Arc::new(b));
        assert_eq!(multi.len(), 3);

        let snap = snapshot();
        let leader = snap.players[0].clone();
        multi.on_event(&snap, &GameEvent::PickDone { leader });
        multi.on_event(
            &snap,
            &GameEvent::SpyWin {
                message: "Spy won!".to_string(),
            },
        );

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.try_recv().unwrap().1.name(), "pick_done");
            assert_eq!(rx.try_recv().unwrap().1.name(), "spy_win");
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn tracing_sink_handles_every_event() {
        let snap = snapshot();
        let p = snap.players[1].clone();
        let events = vec![
            GameEvent::Created,
            GameEvent::Aborted { by: None },
            GameEvent::Started {
                starter: Some(p.clone()),
                config: snap.config,
                error: None,
            },
            GameEvent::Voted {
                voter: None,
                approve: true,
                error: Some(GameError::NotFound("You are not in the game".to_string())),
            },
            GameEvent::VotingDone {
                votes: vec![CastVote {
                    player: p.clone(),
                    approve: false,
                }],
                majority: false,
            },
            GameEvent::MissionDone {
                mission: Mission::new(1, vec![p.clone()], 1),
            },
            GameEvent::PlayersShown {
                players: snap.players.clone(),
                leader_index: Some(9),
                over: false,
            },
        ];
        for event in &events {
            TracingSink.on_event(&snap, event);
        }
    }
}
