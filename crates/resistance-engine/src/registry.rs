use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use resistance_core::error::GameError;
use resistance_core::events::EventSink;
use resistance_core::state::SYSTEM_ID;

use crate::config::EngineConfig;
use crate::game::Game;
use crate::game_loop;

/// Shared handle to the session table.
pub type SharedRegistry = Arc<SessionRegistry>;

struct SessionEntry {
    /// Distinguishes sessions that reuse an id after the previous one ended.
    serial: u64,
    game: Game,
}

/// Table of live sessions keyed by an opaque session id.
///
/// The lock is never held across an await, and never while waiting on a
/// session loop. A session found here is always running: its loop removes
/// the entry and marks itself idle under the same write lock.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    config: Arc<EngineConfig>,
    next_serial: AtomicU64,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> SharedRegistry {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            config: Arc::new(config),
            next_serial: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Return the live session for `id`, creating it if absent. An existing
    /// session is returned unchanged and `sink` is dropped.
    ///
    /// Must be called from within a tokio runtime; a new session spawns its
    /// control loop and notification task.
    pub fn create(self: &Arc<Self>, id: &str, sink: Arc<dyn EventSink>) -> Game {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = sessions.get(id) {
            return entry.game.clone();
        }

        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let game = game_loop::spawn_session(
            id,
            serial,
            Arc::clone(&self.config),
            Arc::downgrade(self),
            sink,
        );
        sessions.insert(
            id.to_string(),
            SessionEntry {
                serial,
                game: game.clone(),
            },
        );
        tracing::info!(session = %id, serial, "Session created");
        game
    }

    pub fn exists(&self, id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn load(&self, id: &str) -> Result<Game, GameError> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|entry| entry.game.clone())
            .ok_or_else(|| GameError::NotFound(format!("No game with id {id}")))
    }

    /// End the session for `id` as the system actor. Its loop removes the
    /// mapping and goes idle under the write lock before this returns, and
    /// sinks see `Aborted { by: None }`. Returns false if no live session
    /// had that id.
    pub async fn delete(&self, id: &str) -> bool {
        let Ok(game) = self.load(id) else {
            return false;
        };
        match game.abort(SYSTEM_ID).await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(session = %id, %err, "Session ended before delete");
                false
            },
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of all live sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Called by a session loop on its terminal transition. Removes the entry
    /// if it still belongs to `serial` and runs `mark_idle` under the write
    /// lock, so no reader sees a listed session that is already idle.
    pub(crate) fn retire(&self, id: &str, serial: u64, mark_idle: impl FnOnce()) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.get(id).is_some_and(|entry| entry.serial == serial) {
            sessions.remove(id);
            tracing::debug!(session = %id, serial, "Session removed from registry");
        }
        mark_idle();
    }
}
