use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Mutation notifications emitted by the store. The browser reloads its
/// whole view after any of these rather than patching listings in place.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Created { id: Uuid },
    Updated { id: Uuid },
    Deleted { id: Uuid },
    Moved { id: Uuid, new_parent: Option<Uuid> },
    Followed { id: Uuid, user: Uuid },
    Unfollowed { id: Uuid, user: Uuid },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
