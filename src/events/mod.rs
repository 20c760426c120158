//! Background events raised by skills
//!
//! Skills never touch the driver directly. They publish events on the bus
//! and whoever drives the conversation reacts (prints a reminder, reloads
//! the registry, changes the log level, replays workflow steps).
//! Publishing is best-effort: with no subscriber the event is dropped and a
//! debug line is logged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Buffered events per subscriber before the slowest one starts lagging
const CHANNEL_CAPACITY: usize = 64;

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A scheduled reminder or alarm fired
    ReminderDue { message: String, due_at: DateTime<Utc> },

    /// The skill set should be rebuilt
    ReloadRequested,

    /// The log filter should change (level is already validated)
    LogLevelRequested { level: String },

    /// These utterances should be routed in order
    WorkflowRequested { name: String, steps: Vec<String> },
}

/// An event with its envelope
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundEvent {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl BackgroundEvent {
    /// Wrap a kind with a fresh id and the current time
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out channel for background events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BackgroundEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, kind: EventKind) {
        let event = BackgroundEvent::new(kind);
        tracing::debug!(id = %event.id, kind = ?event.kind, "publishing background event");
        if self.tx.send(event).is_err() {
            tracing::debug!("no subscribers for background event");
        }
    }

    /// Receive every event published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BackgroundEvent> {
        self.tx.subscribe()
    }

    /// Run `handler` for each event on a background task
    ///
    /// The task ends when every sender is dropped. Lagged events are skipped
    /// with a warning.
    pub fn on_background_event<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(BackgroundEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "background event handler lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(EventKind::ReloadRequested);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ReloadRequested);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        EventBus::new().publish(EventKind::LogLevelRequested {
            level: "debug".to_string(),
        });
    }

    #[tokio::test]
    async fn handler_runs_until_bus_dropped() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let task = bus.on_background_event(move |event| sink.lock().unwrap().push(event.kind));

        bus.publish(EventKind::WorkflowRequested {
            name: "morning".to_string(),
            steps: vec!["what time is it".to_string()],
        });
        drop(bus);
        task.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], EventKind::WorkflowRequested { name, .. } if name == "morning"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = BackgroundEvent::new(EventKind::LogLevelRequested {
            level: "info".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "log_level_requested");
        assert_eq!(json["level"], "info");
    }
}
