use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Structural changes announced after their writes have completed.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TreeEvent {
    SectionCreated { id: Uuid },
    SectionUpdated { id: Uuid },
    SectionMoved { id: Uuid },
    SectionDeleted {
        id: Uuid,
        relocated_to: Option<Uuid>,
    },
    DocumentCreated { id: Uuid },
    DocumentUpdated { id: Uuid },
    DocumentMoved { id: Uuid },
    DocumentReparented {
        id: Uuid,
        section_id: Option<Uuid>,
        parent_id: Option<Uuid>,
    },
    DocumentsDeleted { ids: Vec<Uuid> },
    OrphanAssigned { id: Uuid, section_id: Uuid },
}

/// Events buffered per subscriber before the slowest one starts lagging.
pub const EVENT_CAPACITY: usize = 100;

/// Fan-out of [`TreeEvent`]s to every open subscriber.
///
/// Sending never blocks. A subscriber that falls more than
/// [`EVENT_CAPACITY`] events behind sees `RecvError::Lagged` and should
/// reload the tree rather than replay.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TreeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.sender.subscribe()
    }

    /// Publish `event`; with no subscribers it is dropped.
    pub fn send(&self, event: TreeEvent) {
        if let Err(unheard) = self.sender.send(event) {
            tracing::trace!(event = ?unheard.0, "no subscribers for tree event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_each_event() {
        let bus = EventBus::new();
        bus.send(TreeEvent::SectionCreated { id: Uuid::new_v4() });

        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        let id = Uuid::new_v4();
        bus.send(TreeEvent::DocumentMoved { id });
        assert_eq!(first.recv().await.unwrap(), TreeEvent::DocumentMoved { id });
        assert_eq!(second.recv().await.unwrap(), TreeEvent::DocumentMoved { id });
    }

    #[test]
    fn events_are_tagged_by_type() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(TreeEvent::DocumentsDeleted { ids: vec![id] }).unwrap();
        assert_eq!(json["type"], "DocumentsDeleted");
        assert_eq!(json["ids"][0], id.to_string());
    }
}
