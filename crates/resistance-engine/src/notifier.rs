use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use resistance_core::events::{EventSink, GameEvent};
use resistance_core::snapshot::GameSnapshot;

/// Per-session notification queue. The control loop enqueues and moves on;
/// one dispatcher task drains the queue into the sink in commit order and
/// exits once the loop has dropped its sender and the queue is empty.
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<(GameSnapshot, GameEvent)>,
}

impl Notifier {
    pub(crate) fn spawn(session: Arc<str>, sink: Arc<dyn EventSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(GameSnapshot, GameEvent)>();
        let handle = tokio::spawn(async move {
            while let Some((snapshot, event)) = rx.recv().await {
                tracing::trace!(session = %session, event = event.name(), "Dispatching event");
                sink.on_event(&snapshot, &event);
            }
            tracing::debug!(session = %session, "Notifier drained");
        });
        (Self { tx }, handle)
    }

    pub(crate) fn notify(&self, snapshot: GameSnapshot, event: GameEvent) {
        if let Err(e) = self.tx.send((snapshot, event)) {
            let (snapshot, event) = e.0;
            tracing::warn!(
                session = %snapshot.id,
                event = event.name(),
                "Notification dropped, dispatcher gone"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use resistance_core::state::GameState;

    #[derive(Default)]
    struct Names(Mutex<Vec<&'static str>>);

    impl EventSink for Names {
        fn on_event(&self, _game: &GameSnapshot, event: &GameEvent) {
            self.0.lock().unwrap().push(event.name());
        }
    }

    fn snapshot() -> GameSnapshot {
        GameSnapshot {
            id: "n".to_string(),
            state: GameState::Initialized,
            players: Vec::new(),
            round: 0,
            voting_round: 0,
            leader_index: None,
            picks: Vec::new(),
            votes: BTreeMap::new(),
            missions: Vec::new(),
            config: None,
            spy_won_by_rejection: false,
        }
    }

    #[tokio::test]
    async fn dispatches_in_order_and_drains_on_drop() {
        let sink = Arc::new(Names::default());
        let dyn_sink: Arc<dyn EventSink> = Arc::clone(&sink) as Arc<dyn EventSink>;
        let (notifier, handle) = Notifier::spawn(Arc::from("n"), dyn_sink);
        notifier.notify(snapshot(), GameEvent::Created);
        notifier.notify(
            snapshot(),
            GameEvent::SpyWin {
                message: "done".to_string(),
            },
        );
        drop(notifier);
        handle.await.unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec!["created", "spy_win"]);
    }
}
