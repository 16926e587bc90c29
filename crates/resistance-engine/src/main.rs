use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use resistance_core::error::GameError;
use resistance_core::events::GameEvent;
use resistance_core::player::Player;
use resistance_core::snapshot::GameSnapshot;
use resistance_engine::{
    ChannelSink, EngineConfig, Game, MultiSink, PacingConfig, SessionRegistry, TracingSink,
};

/// Chance that a resistance bot approves a proposed team.
const RESISTANCE_APPROVAL: f64 = 0.7;
/// Chance that a spy on a mission sabotages it.
const SPY_SABOTAGE: f64 = 0.6;

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => !matches!(v.as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = EngineConfig::load();
    if env_flag("RESISTANCE_SIM_FAST", true) {
        config.init_wait_secs = 1;
        config.voting_timeout_secs = 1;
        config.mission_timeout_secs = 1;
        config.pacing = PacingConfig::disabled();
    }
    if let Err(e) = config.validate() {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    let player_count = std::env::var("RESISTANCE_SIM_PLAYERS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(5);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let registry = SessionRegistry::new(config);
    let session_id = uuid::Uuid::new_v4().to_string();
    let (channel, mut events) = ChannelSink::new();
    let sink = MultiSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(channel));
    let game = registry.create(&session_id, Arc::new(sink));

    tracing::info!(session = %session_id, bots = player_count, "Resistance simulation starting");

    for i in 1..=player_count {
        let bot = Player::new(format!("bot-{i}"), format!("Bot {i}"));
        if let Err(e) = game.add_player(bot).await {
            tracing::warn!(%e, "Bot could not join");
        }
    }
    if let Err(e) = game.start("bot-1").await {
        // The lobby timer will retry and abort the session if it still fails.
        tracing::warn!(%e, "Start rejected");
    }

    while let Some((snapshot, event)) = events.recv().await {
        let result = match &event {
            GameEvent::PickStarted { leader } => {
                propose_team(&game, &snapshot, leader, &mut rng).await
            },
            GameEvent::VotingStarted { picks, .. } => {
                vote_on_team(&game, &snapshot, picks, &mut rng).await
            },
            GameEvent::MissionStarted { members } => run_mission(&game, members, &mut rng).await,
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!(event = event.name(), %e, "Bot action rejected");
        }
        if event.is_terminal() {
            break;
        }
    }

    tracing::info!(live_sessions = registry.len(), "Simulation finished");
}

async fn propose_team(
    game: &Game,
    snapshot: &GameSnapshot,
    leader: &Player,
    rng: &mut StdRng,
) -> Result<(), GameError> {
    let size = snapshot.required_picks().unwrap_or(0);
    let mut candidates: Vec<&Player> = snapshot.players.iter().collect();
    candidates.shuffle(rng);
    // Leaders like to go on their own missions.
    candidates.sort_by_key(|p| p.id != leader.id);
    for target in candidates.into_iter().take(size) {
        game.pick(&leader.id, &target.id).await?;
    }
    game.done_pick(&leader.id).await
}

async fn vote_on_team(
    game: &Game,
    snapshot: &GameSnapshot,
    picks: &[Player],
    rng: &mut StdRng,
) -> Result<(), GameError> {
    let team_has_spy = picks.iter().any(Player::is_spy);
    for voter in &snapshot.players {
        // Spies know who is on the team; the resistance has to guess.
        let approve = if voter.is_spy() {
            team_has_spy || rng.random_bool(0.5)
        } else {
            rng.random_bool(RESISTANCE_APPROVAL)
        };
        game.vote(&voter.id, approve).await?;
    }
    Ok(())
}

async fn run_mission(
    game: &Game,
    members: &[Player],
    rng: &mut StdRng,
) -> Result<(), GameError> {
    for member in members {
        let succeed = !(member.is_spy() && rng.random_bool(SPY_SABOTAGE));
        game.execute_mission(&member.id, succeed).await?;
    }
    Ok(())
}
