use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use resistance_core::events::GameEvent;
use resistance_core::player::Player;
use resistance_core::snapshot::GameSnapshot;
use resistance_core::test_helpers::make_players;

use resistance_engine::{ChannelSink, EngineConfig, Game, SessionRegistry, SharedRegistry};

pub type Events = UnboundedReceiver<(GameSnapshot, GameEvent)>;

/// Upper bound on any single wait. Game timers are much shorter, so with
/// paused time they always fire first.
const EVENT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Short timers and a fixed seed; pacing stays on.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        init_wait_secs: 60,
        voting_timeout_secs: 10,
        mission_timeout_secs: 10,
        seed: Some(7),
        ..EngineConfig::default()
    }
}

pub struct TestGame {
    pub registry: SharedRegistry,
    pub game: Game,
    pub events: Events,
}

impl TestGame {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let registry = SessionRegistry::new(config);
        let (sink, events) = ChannelSink::new();
        let game = registry.create("test-room", Arc::new(sink));
        Self {
            registry,
            game,
            events,
        }
    }

    /// Seat players `p1..=pn`, draining their join events.
    pub async fn join(&mut self, n: usize) -> Vec<Player> {
        let players = make_players(n);
        for p in &players {
            self.game.add_player(p.clone()).await.unwrap();
            self.wait_for("player_added").await;
        }
        players
    }

    /// Seat `n` players, start as `p1`, and wait for the first pick phase.
    pub async fn start_game(&mut self, n: usize) -> (GameSnapshot, Player) {
        self.join(n).await;
        self.game.start("p1").await.unwrap();
        self.next_pick().await
    }

    pub async fn next_event(&mut self) -> (GameSnapshot, GameEvent) {
        tokio::time::timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    /// Skip events until one named `name` arrives.
    pub async fn wait_for(&mut self, name: &str) -> (GameSnapshot, GameEvent) {
        loop {
            let (snapshot, event) = self.next_event().await;
            if event.name() == name {
                return (snapshot, event);
            }
        }
    }

    pub async fn next_pick(&mut self) -> (GameSnapshot, Player) {
        match self.wait_for("pick_started").await {
            (snapshot, GameEvent::PickStarted { leader }) => (snapshot, leader),
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// Have `leader` pick `team` and lock it in.
    pub async fn propose(&mut self, leader: &Player, team: &[Player]) {
        for p in team {
            self.game.pick(&leader.id, &p.id).await.unwrap();
        }
        self.game.done_pick(&leader.id).await.unwrap();
        self.wait_for("voting_started").await;
    }

    /// Every seated player casts `approve`; returns the announced majority.
    pub async fn everyone_votes(&mut self, snapshot: &GameSnapshot, approve: bool) -> bool {
        for p in &snapshot.players {
            self.game.vote(&p.id, approve).await.unwrap();
        }
        match self.wait_for("voting_done").await {
            (_, GameEvent::VotingDone { majority, .. }) => majority,
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// Play one full round with `team`: approve it, then have its spies
    /// submit `spy_choice`. Returns the mission result.
    pub async fn play_round(
        &mut self,
        snapshot: &GameSnapshot,
        leader: &Player,
        team: &[Player],
        spy_choice: bool,
    ) -> bool {
        self.propose(leader, team).await;
        assert!(self.everyone_votes(snapshot, true).await);
        self.wait_for("mission_started").await;
        for p in team {
            let choice = if p.is_spy() { spy_choice } else { true };
            self.game.execute_mission(&p.id, choice).await.unwrap();
        }
        match self.wait_for("mission_done").await {
            (_, GameEvent::MissionDone { mission }) => mission.success,
            other => panic!("unexpected event {other:?}"),
        }
    }
}

/// `size` players from the roster: resistance only, or exactly one spy.
pub fn team(snapshot: &GameSnapshot, size: usize, with_spy: bool) -> Vec<Player> {
    let spy = snapshot.players.iter().filter(|p| p.is_spy()).take(usize::from(with_spy));
    let resistance = snapshot.players.iter().filter(|p| p.is_resistance());
    spy.chain(resistance).take(size).cloned().collect()
}
