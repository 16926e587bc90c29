//! The per-session control loop.
//!
//! Each session runs as one tokio task that owns all mutable game state. A
//! phase handler serves queued commands until a command or timer moves the
//! session on, then returns the next [`Phase`]; `run` drives the handlers
//! until the session finishes.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use resistance_core::error::GameError;
use resistance_core::events::{CastVote, EventSink, GameEvent};
use resistance_core::mission::Mission;
use resistance_core::player::{Player, PlayerId};
use resistance_core::round_config::RoundConfig;
use resistance_core::rules::{self, Scoreboard, VoteTally, Winner};
use resistance_core::snapshot::GameSnapshot;
use resistance_core::state::{GameState, Operation, SYSTEM_ID, TIMER_ID};

use crate::config::EngineConfig;
use crate::game::Game;
use crate::notifier::Notifier;
use crate::registry::SessionRegistry;

/// One-shot answer to a queued command.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Requests sent from [`Game`] handles to the session loop.
#[derive(Debug)]
pub(crate) enum GameCommand {
    AddPlayer {
        player: Player,
        reply: Reply<()>,
    },
    Start {
        starter_id: PlayerId,
        reply: Reply<()>,
    },
    Abort {
        actor_id: PlayerId,
        reply: Reply<()>,
    },
    Pick {
        leader_id: PlayerId,
        target_id: PlayerId,
        reply: Reply<()>,
    },
    DonePick {
        leader_id: PlayerId,
        reply: Reply<()>,
    },
    Vote {
        player_id: PlayerId,
        approve: bool,
        reply: Reply<()>,
    },
    ExecuteMission {
        player_id: PlayerId,
        succeed: bool,
        reply: Reply<()>,
    },
    ShowPlayers {
        reply: Reply<()>,
    },
    Info {
        reply: Reply<GameSnapshot>,
    },
}

impl GameCommand {
    fn operation(&self) -> Operation {
        match self {
            Self::AddPlayer { .. } => Operation::AddPlayer,
            Self::Start { .. } => Operation::Start,
            Self::Abort { .. } => Operation::Abort,
            Self::Pick { .. } => Operation::Pick,
            Self::DonePick { .. } => Operation::DonePick,
            Self::Vote { .. } => Operation::Vote,
            Self::ExecuteMission { .. } => Operation::ExecuteMission,
            Self::ShowPlayers { .. } => Operation::ShowPlayers,
            Self::Info { .. } => Operation::Info,
        }
    }

    fn reject(self, err: GameError) {
        match self {
            Self::AddPlayer { reply, .. }
            | Self::Start { reply, .. }
            | Self::Abort { reply, .. }
            | Self::Pick { reply, .. }
            | Self::DonePick { reply, .. }
            | Self::Vote { reply, .. }
            | Self::ExecuteMission { reply, .. }
            | Self::ShowPlayers { reply } => {
                let _ = reply.send(Err(err));
            },
            Self::Info { reply } => {
                let _ = reply.send(Err(err));
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Lobby,
    Pick,
    Voting,
    Mission,
    Finished,
}

/// Allocate a session, queue its `Created` notification and spawn its loop.
pub(crate) fn spawn_session(
    id: &str,
    serial: u64,
    config: Arc<EngineConfig>,
    registry: Weak<SessionRegistry>,
    sink: Arc<dyn EventSink>,
) -> Game {
    let id: Arc<str> = Arc::from(id);
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(GameState::Initialized);
    let (notifier, _dispatcher) = Notifier::spawn(Arc::clone(&id), sink);

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ serial),
        None => StdRng::from_os_rng(),
    };

    let session = Session {
        id: Arc::clone(&id),
        serial,
        players: Vec::new(),
        state: GameState::Initialized,
        round: 0,
        voting_round: 0,
        leader_index: None,
        picks: Vec::new(),
        votes: BTreeMap::new(),
        missions: Vec::new(),
        round_config: None,
        spy_won_by_rejection: false,
        rng,
        config,
        state_tx,
        notifier,
        registry,
    };
    session.notify(GameEvent::Created);
    tokio::spawn(session.run(cmd_rx));

    Game::new(id, cmd_tx, state_rx)
}

struct Session {
    id: Arc<str>,
    serial: u64,
    /// Seating order; shuffled once at start.
    players: Vec<Player>,
    state: GameState,
    round: usize,
    voting_round: usize,
    leader_index: Option<usize>,
    picks: Vec<Player>,
    votes: BTreeMap<PlayerId, bool>,
    missions: Vec<Mission>,
    round_config: Option<RoundConfig>,
    spy_won_by_rejection: bool,
    rng: StdRng,
    config: Arc<EngineConfig>,
    state_tx: watch::Sender<GameState>,
    notifier: Notifier,
    registry: Weak<SessionRegistry>,
}

impl Session {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<GameCommand>) {
        let mut phase = Phase::Lobby;
        loop {
            phase = match phase {
                Phase::Lobby => self.lobby(&mut commands).await,
                Phase::Pick => self.pick_phase(&mut commands).await,
                Phase::Voting => self.voting_phase(&mut commands).await,
                Phase::Mission => self.mission_phase(&mut commands).await,
                Phase::Finished => break,
            };
        }
        debug!(session = %self.id, "Session loop exited");
    }

    // ---- phases ----

    async fn lobby(&mut self, commands: &mut mpsc::UnboundedReceiver<GameCommand>) -> Phase {
        let deadline = Instant::now() + self.config.init_wait();
        if let Some(next) = self.serve(commands, Some(deadline)).await {
            return next;
        }

        info!(session = %self.id, players = self.players.len(), "Lobby timer fired");
        match self.start(TIMER_ID) {
            Ok(()) => Phase::Pick,
            Err(err) => {
                warn!(session = %self.id, %err, "Automatic start failed");
                self.finish_aborted(None);
                Phase::Finished
            },
        }
    }

    async fn pick_phase(&mut self, commands: &mut mpsc::UnboundedReceiver<GameCommand>) -> Phase {
        self.pause(self.config.pick_delay()).await;

        self.voting_round += 1;
        let n = self.players.len();
        self.leader_index = Some(self.leader_index.map_or(0, |i| (i + 1) % n));
        self.picks.clear();
        self.set_state(GameState::Pick);
        if let Some(leader) = self.leader() {
            self.notify(GameEvent::PickStarted { leader });
        }

        self.serve(commands, None).await.unwrap_or(Phase::Finished)
    }

    async fn voting_phase(&mut self, commands: &mut mpsc::UnboundedReceiver<GameCommand>) -> Phase {
        self.pause(self.config.pick_delay()).await;

        self.votes.clear();
        self.set_state(GameState::Voting);
        if let Some(leader) = self.leader() {
            let picks = self.picks.clone();
            self.notify(GameEvent::VotingStarted { leader, picks });
        }

        let deadline = Instant::now() + self.config.voting_timeout();
        if let Some(next) = self.serve(commands, Some(deadline)).await {
            return next;
        }

        self.pause(self.config.pick_delay()).await;
        let tally = VoteTally::count(self.votes.values(), self.players.len());
        let majority = tally.majority();
        let votes: Vec<CastVote> = self
            .players
            .iter()
            .filter_map(|p| {
                self.votes.get(&p.id).map(|&approve| CastVote {
                    player: p.clone(),
                    approve,
                })
            })
            .collect();
        info!(
            session = %self.id,
            round = self.round,
            voting_round = self.voting_round,
            approve = tally.approve,
            reject = tally.reject,
            silent = tally.silent,
            majority,
            "Voting closed"
        );
        self.notify(GameEvent::VotingDone { votes, majority });
        self.pause(self.config.result_delay()).await;

        if majority {
            Phase::Mission
        } else if self.voting_round >= self.config.max_voting_rounds {
            self.spy_won_by_rejection = true;
            let message = format!(
                "Consensus was not reached after {} votes. Spies won!",
                self.voting_round
            );
            self.finish_won(GameEvent::SpyWin { message });
            Phase::Finished
        } else {
            Phase::Pick
        }
    }

    async fn mission_phase(&mut self, commands: &mut mpsc::UnboundedReceiver<GameCommand>) -> Phase {
        let min_fail = self
            .round_config
            .and_then(|c| c.fail_threshold_for_round(self.round))
            .unwrap_or(1);
        let mission = Mission::new(self.round, self.picks.clone(), min_fail);
        let members = mission.members.clone();
        self.missions.push(mission);
        self.set_state(GameState::Mission);
        self.notify(GameEvent::MissionStarted { members });

        let deadline = Instant::now() + self.config.mission_timeout();
        if let Some(next) = self.serve(commands, Some(deadline)).await {
            return next;
        }

        let Some(mission) = self.missions.last_mut() else {
            return self.shutdown();
        };
        mission.execute();
        let done = mission.clone();
        info!(
            session = %self.id,
            round = done.round,
            fails = done.fails(),
            success = done.success,
            "Mission executed"
        );
        self.notify(GameEvent::MissionDone { mission: done });

        match self.scoreboard().and_then(|b| b.winner()) {
            Some(Winner::Spies) => {
                self.finish_won(GameEvent::SpyWin {
                    message: "Spy won!".to_string(),
                });
                Phase::Finished
            },
            Some(Winner::Resistance) => {
                self.finish_won(GameEvent::ResistanceWin {
                    message: "Resistance won!".to_string(),
                });
                Phase::Finished
            },
            None => {
                self.round += 1;
                self.voting_round = 0;
                Phase::Pick
            },
        }
    }

    /// Serve commands until one moves the session to another phase, or
    /// until `deadline` passes, in which case `None` is returned.
    async fn serve(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<GameCommand>,
        deadline: Option<Instant>,
    ) -> Option<Phase> {
        loop {
            let cmd = match deadline {
                Some(at) => tokio::select! {
                    cmd = commands.recv() => cmd,
                    () = tokio::time::sleep_until(at) => return None,
                },
                None => commands.recv().await,
            };
            let Some(cmd) = cmd else {
                return Some(self.shutdown());
            };
            if let Some(next) = self.dispatch(cmd) {
                return Some(next);
            }
        }
    }

    /// Announcement pacing. Commands stay queued meanwhile.
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // ---- commands ----

    fn dispatch(&mut self, cmd: GameCommand) -> Option<Phase> {
        let op = cmd.operation();
        debug!(session = %self.id, ?op, state = %self.state, "Command received");
        // The phase may have moved on while the command was queued.
        if let Err(err) = op.check(self.state) {
            cmd.reject(err);
            return None;
        }

        match cmd {
            GameCommand::AddPlayer { player, reply } => {
                let _ = reply.send(self.add_player(player));
                None
            },
            GameCommand::Start { starter_id, reply } => {
                let result = self.start(&starter_id);
                let next = result.is_ok().then_some(Phase::Pick);
                let _ = reply.send(result);
                next
            },
            GameCommand::Abort { actor_id, reply } => {
                let result = self.abort(&actor_id);
                let next = result.is_ok().then_some(Phase::Finished);
                let _ = reply.send(result);
                next
            },
            GameCommand::Pick {
                leader_id,
                target_id,
                reply,
            } => {
                let _ = reply.send(self.pick(&leader_id, &target_id));
                None
            },
            GameCommand::DonePick { leader_id, reply } => {
                let result = self.done_pick(&leader_id);
                let next = result.is_ok().then_some(Phase::Voting);
                let _ = reply.send(result);
                next
            },
            GameCommand::Vote {
                player_id,
                approve,
                reply,
            } => {
                let _ = reply.send(self.vote(&player_id, approve));
                None
            },
            GameCommand::ExecuteMission {
                player_id,
                succeed,
                reply,
            } => {
                let _ = reply.send(self.execute_mission(&player_id, succeed));
                None
            },
            GameCommand::ShowPlayers { reply } => {
                self.show_players();
                let _ = reply.send(Ok(()));
                None
            },
            GameCommand::Info { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
                None
            },
        }
    }

    fn add_player(&mut self, mut player: Player) -> Result<(), GameError> {
        let error = if self.players.len() >= self.config.max_players {
            Some(GameError::Capacity("Cannot add more players".to_string()))
        } else {
            self.find_player(&player.id).map(|existing| {
                GameError::Authorization(format!("{} is already in the game", existing.display_name))
            })
        };

        if let Some(err) = error {
            self.notify(GameEvent::PlayerAdded {
                player,
                error: Some(err.clone()),
            });
            return Err(err);
        }

        player.role = None;
        self.players.push(player.clone());
        debug!(session = %self.id, player = %player.id, count = self.players.len(), "Player joined");
        self.notify(GameEvent::PlayerAdded {
            player,
            error: None,
        });
        Ok(())
    }

    fn start(&mut self, starter_id: &str) -> Result<(), GameError> {
        let starter = self.find_player(starter_id).cloned();
        if starter.is_none() && starter_id != TIMER_ID {
            let err =
                GameError::Authorization("Only players in the game can start the game".to_string());
            self.notify(GameEvent::Started {
                starter: None,
                config: None,
                error: Some(err.clone()),
            });
            return Err(err);
        }

        let n = self.players.len();
        let (min, max) = (self.config.min_players, self.config.max_players);
        let config = if (min..=max).contains(&n) {
            RoundConfig::lookup(n)
        } else {
            None
        };
        let Some(config) = config else {
            let err = GameError::Capacity(format!(
                "Number of players should be between {min} and {max}"
            ));
            self.notify(GameEvent::Started {
                starter,
                config: None,
                error: Some(err.clone()),
            });
            return Err(err);
        };

        rules::deal_roles(&mut self.players, config.spy_count, &mut self.rng);
        self.round_config = Some(config);
        self.round = 1;
        info!(
            session = %self.id,
            players = n,
            spies = config.spy_count,
            starter = %starter_id,
            "Game started"
        );
        self.notify(GameEvent::Started {
            starter,
            config: Some(config),
            error: None,
        });
        Ok(())
    }

    fn abort(&mut self, actor_id: &str) -> Result<(), GameError> {
        let by = match self.find_player(actor_id) {
            Some(p) => Some(p.clone()),
            None if actor_id == SYSTEM_ID => None,
            None => {
                return Err(GameError::Authorization(
                    "Only players in the game can abort the game".to_string(),
                ));
            },
        };
        self.finish_aborted(by);
        Ok(())
    }

    fn pick(&mut self, leader_id: &str, target_id: &str) -> Result<(), GameError> {
        let Some(leader) = self.leader() else {
            return Err(GameError::Validation("Cannot pick now".to_string()));
        };
        if leader.id != leader_id {
            return Err(GameError::Authorization(
                "You have no right to choose".to_string(),
            ));
        }

        if let Some(pos) = self.picks.iter().position(|p| p.id == target_id) {
            let unpicked = self.picks.remove(pos);
            self.notify(GameEvent::Unpicked { leader, unpicked });
            return Ok(());
        }

        let Some(target) = self.find_player(target_id).cloned() else {
            let err = GameError::NotFound(
                "Cannot choose players who are not in the game".to_string(),
            );
            self.notify(GameEvent::Picked {
                leader,
                picked: None,
                error: Some(err.clone()),
            });
            return Err(err);
        };

        self.picks.push(target.clone());
        self.notify(GameEvent::Picked {
            leader,
            picked: Some(target),
            error: None,
        });
        Ok(())
    }

    fn done_pick(&mut self, leader_id: &str) -> Result<(), GameError> {
        let Some(leader) = self.leader() else {
            return Err(GameError::Validation("Cannot done picking now".to_string()));
        };
        if leader.id != leader_id {
            return Err(GameError::Authorization(
                "You have no right to finish picking".to_string(),
            ));
        }

        let required = self
            .round_config
            .and_then(|c| c.members_for_round(self.round))
            .unwrap_or(0);
        if self.picks.len() != required {
            let err =
                GameError::Validation(format!("You must choose exactly {required} people"));
            // Count errors are narrated through the pick callback.
            self.notify(GameEvent::Picked {
                leader,
                picked: None,
                error: Some(err.clone()),
            });
            return Err(err);
        }

        info!(session = %self.id, round = self.round, leader = %leader.id, "Team proposed");
        self.notify(GameEvent::PickDone { leader });
        Ok(())
    }

    fn vote(&mut self, player_id: &str, approve: bool) -> Result<(), GameError> {
        let Some(voter) = self.find_player(player_id).cloned() else {
            let err = GameError::NotFound("You are not in the game".to_string());
            self.notify(GameEvent::Voted {
                voter: None,
                approve,
                error: Some(err.clone()),
            });
            return Err(err);
        };

        self.votes.insert(voter.id.clone(), approve);
        self.notify(GameEvent::Voted {
            voter: Some(voter),
            approve,
            error: None,
        });
        Ok(())
    }

    fn execute_mission(&mut self, player_id: &str, succeed: bool) -> Result<(), GameError> {
        let round = self.round;
        let Some(mission) = self.missions.last_mut().filter(|m| m.round == round) else {
            return Err(GameError::Validation("No running mission".to_string()));
        };
        if !mission.has_member(player_id) {
            return Err(GameError::Authorization(
                "You are not part of the mission".to_string(),
            ));
        }
        let Some(player) = self.players.iter().find(|p| p.id == player_id).cloned() else {
            return Err(GameError::NotFound("You are not in the game".to_string()));
        };

        // Resistance members can only help a mission succeed.
        if player.is_spy() {
            mission.record(&player.id, succeed);
        }
        self.notify(GameEvent::MissionExecuted {
            player,
            success: succeed,
        });
        Ok(())
    }

    fn show_players(&self) {
        let snapshot = self.snapshot();
        let event = GameEvent::PlayersShown {
            players: snapshot.players.clone(),
            leader_index: snapshot.leader_index,
            over: snapshot.over(),
        };
        self.notifier.notify(snapshot, event);
    }

    // ---- termination ----

    fn finish_aborted(&mut self, by: Option<Player>) {
        info!(
            session = %self.id,
            by = by.as_ref().map_or(SYSTEM_ID, |p| p.id.as_str()),
            "Game aborted"
        );
        self.terminate();
        self.notify(GameEvent::Aborted { by });
    }

    fn finish_won(&mut self, event: GameEvent) {
        info!(
            session = %self.id,
            round = self.round,
            outcome = event.name(),
            "Game over"
        );
        self.terminate();
        self.notify(event);
    }

    /// Every handle is gone; stop without narration.
    fn shutdown(&mut self) -> Phase {
        debug!(session = %self.id, "Command queue closed");
        self.terminate();
        Phase::Finished
    }

    /// Leave the registry and publish `Idle` under its write lock.
    fn terminate(&mut self) {
        self.state = GameState::Idle;
        let state_tx = &self.state_tx;
        let mark_idle = || {
            state_tx.send_replace(GameState::Idle);
        };
        match self.registry.upgrade() {
            Some(registry) => registry.retire(&self.id, self.serial, mark_idle),
            None => mark_idle(),
        }
    }

    // ---- helpers ----

    fn set_state(&mut self, state: GameState) {
        self.state = state;
        self.state_tx.send_replace(state);
        info!(
            session = %self.id,
            %state,
            round = self.round,
            voting_round = self.voting_round,
            "State changed"
        );
    }

    fn find_player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn leader(&self) -> Option<Player> {
        self.leader_index
            .and_then(|i| self.players.get(i))
            .cloned()
    }

    fn scoreboard(&self) -> Option<Scoreboard> {
        let config = self.round_config?;
        Some(
            Scoreboard::from_missions(&self.missions, config.total_rounds)
                .with_rejection(self.spy_won_by_rejection),
        )
    }

    fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id.to_string(),
            state: self.state,
            players: self.players.clone(),
            round: self.round,
            voting_round: self.voting_round,
            leader_index: self.leader_index,
            picks: self.picks.clone(),
            votes: self.votes.clone(),
            missions: self.missions.clone(),
            config: self.round_config,
            spy_won_by_rejection: self.spy_won_by_rejection,
        }
    }

    fn notify(&self, event: GameEvent) {
        self.notifier.notify(self.snapshot(), event);
    }
}
