use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Weekday};

use super::{AlarmScheduler, Authorization, Presentation, ScheduledAlarm, Trigger};
use crate::alarm::TimeOfDay;
use crate::clock::Clock;
use crate::error::SchedulerError;

#[derive(Debug)]
struct MemoryState {
    registrations: BTreeMap<String, ScheduledAlarm>,
    authorization: Authorization,
    rejected: HashSet<NaiveDateTime>,
    failing_cancels: bool,
    cancelled: Vec<String>,
}

/// In-process scheduler.
///
/// A fixed registration is alive until its fire time passes on the injected
/// clock, or until it is cancelled or expired by hand.
pub struct MemoryScheduler {
    clock: Arc<dyn Clock>,
    weekly: bool,
    state: Mutex<MemoryState>,
}

impl MemoryScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            weekly: true,
            state: Mutex::new(MemoryState {
                registrations: BTreeMap::new(),
                authorization: Authorization::Authorized,
                rejected: HashSet::new(),
                failing_cancels: false,
                cancelled: Vec::new(),
            }),
        }
    }

    /// A scheduler without native weekly repeat.
    pub fn without_weekly_repeat(mut self) -> Self {
        self.weekly = false;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_authorization(&self, authorization: Authorization) {
        self.state().authorization = authorization;
    }

    /// Make registrations at `at` fail.
    pub fn reject_instant(&self, at: NaiveDateTime) {
        self.state().rejected.insert(at);
    }

    pub fn fail_cancels(&self, failing: bool) {
        self.state().failing_cancels = failing;
    }

    /// Drop a registration as if it fired and was dismissed.
    pub fn expire(&self, id: &str) -> Option<ScheduledAlarm> {
        self.state().registrations.remove(id)
    }

    /// All registrations, alive or not, ordered by id.
    pub fn registrations(&self) -> Vec<ScheduledAlarm> {
        self.state().registrations.values().cloned().collect()
    }

    /// Ids passed to `cancel`, in call order.
    pub fn cancelled_ids(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    fn insert(&self, id: &str, trigger: Trigger, presentation: &Presentation) {
        self.state().registrations.insert(
            id.to_string(),
            ScheduledAlarm {
                id: id.to_string(),
                trigger,
                presentation: presentation.clone(),
            },
        );
    }
}

#[async_trait]
impl AlarmScheduler for MemoryScheduler {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_weekly_repeat(&self) -> bool {
        self.weekly
    }

    async fn request_authorization(&self) -> Result<Authorization, SchedulerError> {
        Ok(self.state().authorization)
    }

    async fn schedule(
        &self,
        id: &str,
        at: NaiveDateTime,
        presentation: &Presentation,
    ) -> Result<(), SchedulerError> {
        if self.state().rejected.contains(&at) {
            return Err(SchedulerError::RegistrationFailed {
                id: id.to_string(),
                reason: format!("instant {at} rejected"),
            });
        }
        self.insert(id, Trigger::Fixed { at }, presentation);
        Ok(())
    }

    async fn schedule_weekly(
        &self,
        id: &str,
        weekdays: &[Weekday],
        time: TimeOfDay,
        presentation: &Presentation,
    ) -> Result<(), SchedulerError> {
        if !self.weekly {
            return Err(SchedulerError::RegistrationFailed {
                id: id.to_string(),
                reason: "weekly repeat not supported".into(),
            });
        }
        let trigger = Trigger::Weekly {
            weekdays: weekdays.to_vec(),
            time,
        };
        self.insert(id, trigger, presentation);
        Ok(())
    }

    async fn cancel(&self, id: &str) -> Result<(), SchedulerError> {
        let mut state = self.state();
        state.cancelled.push(id.to_string());
        if state.failing_cancels {
            return Err(SchedulerError::CancellationFailed {
                id: id.to_string(),
                reason: "cancel refused".into(),
            });
        }
        state.registrations.remove(id);
        Ok(())
    }

    async fn alive_ids(&self) -> Result<HashSet<String>, SchedulerError> {
        let now = self.clock.now();
        Ok(self
            .state()
            .registrations
            .values()
            .filter(|r| r.is_alive_at(now))
            .map(|r| r.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmSpec;
    use crate::clock::FixedClock;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 6)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn registrations_expire_with_the_clock() {
        let clock = Arc::new(FixedClock::new(now()));
        let scheduler = MemoryScheduler::new(clock.clone());
        let spec = AlarmSpec::new(TimeOfDay::new(9, 0).unwrap());
        let p = Presentation::for_alarm(&spec, "a");
        scheduler
            .schedule("a", now() + Duration::hours(1), &p)
            .await
            .unwrap();
        assert!(scheduler.alive_ids().await.unwrap().contains("a"));

        clock.advance(Duration::hours(2));
        assert!(scheduler.alive_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_ok() {
        let scheduler = MemoryScheduler::new(Arc::new(FixedClock::new(now())));
        assert!(scheduler.cancel("missing").await.is_ok());
        assert_eq!(scheduler.cancelled_ids(), vec!["missing"]);
    }

    #[tokio::test]
    async fn rejected_instant_fails_registration() {
        let scheduler = MemoryScheduler::new(Arc::new(FixedClock::new(now())));
        let at = now() + Duration::hours(1);
        scheduler.reject_instant(at);
        let spec = AlarmSpec::new(TimeOfDay::new(9, 0).unwrap());
        let err = scheduler
            .schedule("a", at, &Presentation::for_alarm(&spec, "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::RegistrationFailed { .. }));
        assert!(scheduler.registrations().is_empty());
    }
}
