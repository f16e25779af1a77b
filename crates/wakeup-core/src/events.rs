//! Stop events delivered by the external scheduler.
//!
//! A stop event means one registered instant fired and the user dismissed
//! it. The coordinator turns it into either "disable this one-shot alarm"
//! or a replenishment check.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::coordinator::{ReplenishOutcome, SchedulingCoordinator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopEvent {
    pub instance_id: String,
    pub alarm_id: Uuid,
}

/// What [`SchedulingCoordinator::handle_stop`] did with an event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StopDisposition {
    /// A one-shot alarm finished: it was disabled and its registrations cancelled.
    Disabled,
    Replenished { outcome: ReplenishOutcome },
    /// The alarm is no longer in the store.
    UnknownAlarm,
}

/// Feed every event from `events` to the coordinator until the channel closes.
///
/// A failing event is logged and does not stop the listener.
pub fn spawn_stop_listener(
    coordinator: Arc<SchedulingCoordinator>,
    mut events: mpsc::Receiver<StopEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match coordinator.handle_stop(&event).await {
                Ok(disposition) => tracing::debug!(
                    alarm_id = %event.alarm_id,
                    instance_id = %event.instance_id,
                    ?disposition,
                    "stop event handled"
                ),
                Err(e) => tracing::warn!(
                    alarm_id = %event.alarm_id,
                    instance_id = %event.instance_id,
                    error = %e,
                    "failed to handle stop event"
                ),
            }
        }
        tracing::debug!("stop event channel closed");
    })
}
