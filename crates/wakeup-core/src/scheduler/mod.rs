//! External one-shot alarm scheduler.
//!
//! The scheduler is the only authority on which registrations are still
//! pending. Implementations:
//! - [`MemoryScheduler`]: in-process, with failure injection for tests
//! - [`LocalScheduler`]: SQLite-backed, used by the CLI

mod local;
mod memory;

pub use local::LocalScheduler;
pub use memory::MemoryScheduler;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alarm::{AlarmSpec, TimeOfDay};
use crate::error::SchedulerError;

/// Answer to an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    Authorized,
    Denied,
    NotDetermined,
}

/// Snooze button attached to a ringing alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeAction {
    pub minutes: u32,
}

/// What the scheduler shows when a registration fires.
///
/// `alarm_id` travels with the registration so a stop event can be
/// correlated back to its logical alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub title: String,
    pub sound_name: String,
    pub snooze: Option<SnoozeAction>,
    pub alarm_id: Uuid,
    pub instance_id: String,
}

impl Presentation {
    pub fn for_alarm(spec: &AlarmSpec, instance_id: &str) -> Self {
        Self {
            title: spec.label.clone(),
            sound_name: spec.sound_name.clone(),
            snooze: spec.snooze.enabled.then_some(SnoozeAction {
                minutes: spec.snooze.minutes,
            }),
            alarm_id: spec.id,
            instance_id: instance_id.to_string(),
        }
    }

    /// Presentation of a snooze follow-up: no further snooze button.
    pub fn snoozed(spec: &AlarmSpec, instance_id: &str) -> Self {
        Self {
            title: "Snooze".to_string(),
            snooze: None,
            ..Self::for_alarm(spec, instance_id)
        }
    }
}

/// When a registration fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Fixed { at: NaiveDateTime },
    Weekly { weekdays: Vec<Weekday>, time: TimeOfDay },
}

/// A registration as held by a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAlarm {
    pub id: String,
    pub trigger: Trigger,
    pub presentation: Presentation,
}

impl ScheduledAlarm {
    pub fn alarm_id(&self) -> Uuid {
        self.presentation.alarm_id
    }

    /// Whether the registration is still pending at `now`.
    pub fn is_alive_at(&self, now: NaiveDateTime) -> bool {
        match self.trigger {
            Trigger::Fixed { at } => at > now,
            Trigger::Weekly { .. } => true,
        }
    }
}

/// Capabilities of an external one-shot scheduler.
///
/// Every call may suspend. Cancelling an unknown id is not an error.
#[async_trait]
pub trait AlarmScheduler: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Whether [`AlarmScheduler::schedule_weekly`] is supported.
    fn supports_weekly_repeat(&self) -> bool {
        true
    }

    async fn request_authorization(&self) -> Result<Authorization, SchedulerError>;

    async fn schedule(
        &self,
        id: &str,
        at: NaiveDateTime,
        presentation: &Presentation,
    ) -> Result<(), SchedulerError>;

    /// Register a perpetual weekly repeat.
    async fn schedule_weekly(
        &self,
        id: &str,
        weekdays: &[Weekday],
        time: TimeOfDay,
        presentation: &Presentation,
    ) -> Result<(), SchedulerError>;

    async fn cancel(&self, id: &str) -> Result<(), SchedulerError>;

    /// Ids of every registration that is still pending.
    async fn alive_ids(&self) -> Result<HashSet<String>, SchedulerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::Snooze;
    use chrono::NaiveDate;

    #[test]
    fn presentation_carries_snooze_only_when_enabled() {
        let spec = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap()).with_label("Gym");
        let p = Presentation::for_alarm(&spec, "i-1");
        assert_eq!(p.title, "Gym");
        assert_eq!(p.snooze, Some(SnoozeAction { minutes: 5 }));

        let quiet = spec.with_snooze(Snooze {
            enabled: false,
            minutes: 5,
        });
        assert_eq!(Presentation::for_alarm(&quiet, "i-2").snooze, None);
    }

    #[test]
    fn snoozed_presentation_has_no_snooze_button() {
        let spec = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap());
        let p = Presentation::snoozed(&spec, "s-1");
        assert_eq!(p.title, "Snooze");
        assert!(p.snooze.is_none());
        assert_eq!(p.alarm_id, spec.id);
    }

    #[test]
    fn fixed_registrations_expire_weekly_do_not() {
        let spec = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap());
        let at = NaiveDate::from_ymd_opt(2026, 2, 6)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let fixed = ScheduledAlarm {
            id: "f".into(),
            trigger: Trigger::Fixed { at },
            presentation: Presentation::for_alarm(&spec, "f"),
        };
        assert!(fixed.is_alive_at(at - chrono::Duration::seconds(1)));
        assert!(!fixed.is_alive_at(at));

        let weekly = ScheduledAlarm {
            id: "w".into(),
            trigger: Trigger::Weekly {
                weekdays: vec![Weekday::Mon],
                time: spec.time,
            },
            presentation: Presentation::for_alarm(&spec, "w"),
        };
        assert!(weekly.is_alive_at(at + chrono::Duration::days(365)));
    }
}
