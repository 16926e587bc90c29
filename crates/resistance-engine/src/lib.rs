//! Async runtime for Resistance sessions: the session registry, the
//! per-session control loop behind [`Game`] handles, event dispatch, and
//! configuration.

pub mod config;
pub mod game;
mod game_loop;
mod notifier;
pub mod registry;
pub mod sinks;

pub use config::{ConfigError, EngineConfig, PacingConfig};
pub use game::Game;
pub use registry::{SessionRegistry, SharedRegistry};
pub use sinks::{ChannelSink, MultiSink, TracingSink};
