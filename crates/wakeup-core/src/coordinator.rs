//! Scheduling coordinator.
//!
//! Keeps each logical alarm's registrations on the external scheduler in
//! line with its definition:
//! - `resync`: cancel everything registered, expand, register, record
//! - `check_and_replenish`: prune dead ids and resync when too few remain
//! - `handle_stop`: one-shot alarms are disabled, the rest replenished
//!
//! All mutations of one alarm's registry entry run under that alarm's lock.
//! Different alarms never wait on each other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use crate::alarm::{AlarmSpec, RepeatMode, RepeatRule, MAX_SNOOZE_MINUTES, MIN_SNOOZE_MINUTES};
use crate::clock::Clock;
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{StopDisposition, StopEvent};
use crate::expand::{expand, HorizonPolicy, Occurrence};
use crate::holiday::WorkdayOracle;
use crate::registry::InstanceRegistry;
use crate::scheduler::{AlarmScheduler, Authorization, Presentation};
use crate::storage::Config;
use crate::store::AlarmStore;

/// Alive registrations below which a non-exempt alarm is resynced.
pub const DEFAULT_MIN_ALIVE: usize = 5;

/// Result of one `resync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub alarm_id: Uuid,
    /// Previously registered ids that were cancelled.
    pub cancelled: usize,
    /// Cancels the scheduler refused. Those ids are dropped from the registry anyway.
    pub cancel_failures: usize,
    /// Newly registered ids, in expansion order.
    pub registered: Vec<String>,
    /// Occurrences the scheduler rejected.
    pub failed: usize,
}

impl SyncReport {
    fn new(alarm_id: Uuid) -> Self {
        Self {
            alarm_id,
            ..Self::default()
        }
    }
}

/// Result of one replenishment check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplenishOutcome {
    /// The registry has no ids for this alarm.
    NothingRegistered,
    /// Enough registrations are alive.
    Healthy { alive: usize, pruned: usize },
    /// Below the floor, but the repeat mode never needs topping up.
    Exempt { alive: usize, pruned: usize },
    /// The alarm is disabled; its remaining registrations were cancelled.
    Disabled { cancelled: usize },
    /// Registry ids exist for an alarm missing from the store.
    UnknownAlarm { pruned: usize },
    Replenished {
        alive: usize,
        pruned: usize,
        report: SyncReport,
    },
}

/// Result of [`SchedulingCoordinator::startup`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartupSummary {
    pub checked: usize,
    /// Enabled alarms with nothing registered, synced from scratch.
    pub synced: Vec<Uuid>,
    pub replenished: Vec<Uuid>,
    /// Registry entries of deleted or disabled alarms that were cancelled.
    pub orphans_cleared: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

/// One async mutex per alarm id.
#[derive(Default)]
struct AlarmLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl AlarmLocks {
    /// Entries nobody else holds are dropped on the way, so the map tracks
    /// alarms in flight rather than every alarm ever seen.
    fn for_alarm(&self, alarm_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|id, lock| *id == alarm_id || Arc::strong_count(lock) > 1);
        locks.entry(alarm_id).or_default().clone()
    }

    /// Drop the entry for `alarm_id` unless a task still holds or awaits it.
    fn forget(&self, alarm_id: Uuid) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&alarm_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&alarm_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Orchestrates expansion, registration and replenishment.
pub struct SchedulingCoordinator {
    scheduler: Arc<dyn AlarmScheduler>,
    registry: Arc<dyn InstanceRegistry>,
    alarms: Arc<dyn AlarmStore>,
    oracle: WorkdayOracle,
    clock: Arc<dyn Clock>,
    horizon: HorizonPolicy,
    min_alive: usize,
    locks: AlarmLocks,
}

impl SchedulingCoordinator {
    pub fn new(
        scheduler: Arc<dyn AlarmScheduler>,
        registry: Arc<dyn InstanceRegistry>,
        alarms: Arc<dyn AlarmStore>,
        oracle: WorkdayOracle,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            registry,
            alarms,
            oracle,
            clock,
            horizon: HorizonPolicy::default(),
            min_alive: DEFAULT_MIN_ALIVE,
            locks: AlarmLocks::default(),
        }
    }

    pub fn with_horizon(mut self, horizon: HorizonPolicy) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_min_alive(mut self, min_alive: usize) -> Self {
        self.min_alive = min_alive;
        self
    }

    /// Apply `[horizon]`, `[scheduler]` and `[replenish]` settings.
    pub fn with_config(self, config: &Config) -> Self {
        let min_alive = config.replenish.min_alive;
        self.with_horizon(config.horizon_policy())
            .with_min_alive(min_alive)
    }

    pub fn scheduler(&self) -> &Arc<dyn AlarmScheduler> {
        &self.scheduler
    }

    pub fn registry(&self) -> &Arc<dyn InstanceRegistry> {
        &self.registry
    }

    pub fn alarms(&self) -> &Arc<dyn AlarmStore> {
        &self.alarms
    }

    /// Horizon with native weekly repeat only when both configured and
    /// supported by the scheduler.
    pub fn effective_horizon(&self) -> HorizonPolicy {
        HorizonPolicy {
            native_weekly: self.horizon.native_weekly && self.scheduler.supports_weekly_repeat(),
            ..self.horizon.clone()
        }
    }

    /// Whether the replenishment floor never applies to `spec`.
    ///
    /// `once` terminates by itself. `weekly` is exempt only while it is
    /// registered as a native repeat; explicitly expanded weeks run out.
    pub fn is_exempt(&self, spec: &AlarmSpec) -> bool {
        match &spec.repeat {
            RepeatRule::Once => true,
            RepeatRule::Weekly { days } => {
                days.is_empty() || self.effective_horizon().native_weekly
            }
            _ => false,
        }
    }

    /// What `resync` would register for `spec` right now, without touching
    /// the scheduler.
    pub fn preview(&self, spec: &AlarmSpec) -> Result<Vec<Occurrence>> {
        spec.validate()?;
        Ok(expand(
            spec,
            self.clock.now(),
            &self.effective_horizon(),
            &self.oracle,
        ))
    }

    /// Cancel everything registered for `spec`, then register a fresh
    /// horizon if the alarm is enabled.
    ///
    /// # Errors
    /// Invalid specs are refused before anything is cancelled. Without
    /// authorization nothing is registered and `PermissionDenied` is
    /// returned. Individual registration failures are logged and skipped.
    pub async fn resync(&self, spec: &AlarmSpec) -> Result<SyncReport> {
        spec.validate()?;
        let lock = self.locks.for_alarm(spec.id);
        let _guard = lock.lock().await;
        self.resync_locked(spec).await
    }

    /// Resync the stored alarm `alarm_id`.
    pub async fn resync_id(&self, alarm_id: Uuid) -> Result<SyncReport> {
        let spec = self
            .alarms
            .get(alarm_id)?
            .ok_or(CoreError::UnknownAlarm(alarm_id))?;
        self.resync(&spec).await
    }

    /// Resync every stored alarm. Disabled alarms end up with nothing
    /// registered.
    ///
    /// A missing authorization stops the whole run; other per-alarm
    /// failures are logged and skipped.
    pub async fn resync_all(&self) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::new();
        for spec in self.alarms.list()? {
            match self.resync(&spec).await {
                Ok(report) => reports.push(report),
                Err(e @ CoreError::PermissionDenied { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(alarm_id = %spec.id, error = %e, "resync failed");
                }
            }
        }
        Ok(reports)
    }

    /// Cancel and forget every registration of `alarm_id`.
    /// Returns how many ids were registered.
    pub async fn remove(&self, alarm_id: Uuid) -> Result<usize> {
        let (cancelled, _) = {
            let lock = self.locks.for_alarm(alarm_id);
            let _guard = lock.lock().await;
            self.cancel_all_locked(alarm_id).await?
        };
        self.locks.forget(alarm_id);
        tracing::info!(%alarm_id, cancelled, "alarm registrations removed");
        Ok(cancelled)
    }

    /// Prune dead ids and top the horizon back up if too few remain.
    pub async fn check_and_replenish(&self, alarm_id: Uuid) -> Result<ReplenishOutcome> {
        let lock = self.locks.for_alarm(alarm_id);
        let _guard = lock.lock().await;
        self.replenish_locked(alarm_id).await
    }

    /// React to a dismissed registration.
    pub async fn handle_stop(&self, event: &StopEvent) -> Result<StopDisposition> {
        let lock = self.locks.for_alarm(event.alarm_id);
        let _guard = lock.lock().await;

        let Some(spec) = self.alarms.get(event.alarm_id)? else {
            tracing::warn!(
                alarm_id = %event.alarm_id,
                instance_id = %event.instance_id,
                "stop event for unknown alarm"
            );
            return Ok(StopDisposition::UnknownAlarm);
        };

        if spec.mode() == RepeatMode::Once {
            self.alarms.set_enabled(spec.id, false)?;
            let (cancelled, _) = self.cancel_all_locked(spec.id).await?;
            tracing::info!(alarm_id = %spec.id, cancelled, "one-shot alarm finished");
            return Ok(StopDisposition::Disabled);
        }

        let outcome = self.replenish_locked(spec.id).await?;
        Ok(StopDisposition::Replenished { outcome })
    }

    /// Process-start reconciliation.
    ///
    /// Every enabled alarm is checked: with nothing registered it is synced
    /// from scratch, otherwise replenished. Registry entries left behind by
    /// deleted or disabled alarms are cancelled. Per-alarm failures are
    /// recorded and the run continues.
    pub async fn startup(&self) -> Result<StartupSummary> {
        let enabled = self.alarms.list_enabled()?;
        let mut summary = StartupSummary::default();

        for spec in &enabled {
            summary.checked += 1;
            let lock = self.locks.for_alarm(spec.id);
            let _guard = lock.lock().await;

            match self.startup_one(spec).await {
                Ok(StartupAction::Synced) => summary.synced.push(spec.id),
                Ok(StartupAction::Replenished) => summary.replenished.push(spec.id),
                Ok(StartupAction::Unchanged) => {}
                Err(e) => {
                    tracing::warn!(alarm_id = %spec.id, error = %e, "startup check failed");
                    summary.failed.push((spec.id, e.to_string()));
                }
            }
        }

        let enabled_ids: HashSet<Uuid> = enabled.iter().map(|a| a.id).collect();
        for alarm_id in self.registry.alarm_ids()? {
            if enabled_ids.contains(&alarm_id) {
                continue;
            }
            let lock = self.locks.for_alarm(alarm_id);
            let _guard = lock.lock().await;
            match self.cancel_all_locked(alarm_id).await {
                Ok(_) => summary.orphans_cleared.push(alarm_id),
                Err(e) => summary.failed.push((alarm_id, e.to_string())),
            }
        }

        tracing::info!(
            checked = summary.checked,
            synced = summary.synced.len(),
            replenished = summary.replenished.len(),
            orphans = summary.orphans_cleared.len(),
            failed = summary.failed.len(),
            "startup reconciliation done"
        );
        Ok(summary)
    }

    /// Register a one-shot follow-up `minutes` from now.
    ///
    /// The id joins the alarm's registry entry, so the next resync cancels it.
    pub async fn snooze(&self, alarm_id: Uuid, minutes: u32) -> Result<String> {
        if !(MIN_SNOOZE_MINUTES..=MAX_SNOOZE_MINUTES).contains(&minutes) {
            return Err(ValidationError::out_of_range(
                "snooze minutes",
                minutes.into(),
                MIN_SNOOZE_MINUTES.into(),
                MAX_SNOOZE_MINUTES.into(),
            )
            .into());
        }

        let lock = self.locks.for_alarm(alarm_id);
        let _guard = lock.lock().await;

        let spec = self
            .alarms
            .get(alarm_id)?
            .ok_or(CoreError::UnknownAlarm(alarm_id))?;
        self.ensure_authorized(alarm_id).await?;

        let id = Uuid::new_v4().to_string();
        let at = self.clock.now() + Duration::minutes(minutes.into());
        self.scheduler
            .schedule(&id, at, &Presentation::snoozed(&spec, &id))
            .await?;
        self.registry.append(alarm_id, &id)?;
        tracing::info!(%alarm_id, instance_id = %id, %at, "snooze registered");
        Ok(id)
    }

    async fn startup_one(&self, spec: &AlarmSpec) -> Result<StartupAction> {
        if self.registry.ids(spec.id)?.is_empty() {
            self.resync_locked(spec).await?;
            return Ok(StartupAction::Synced);
        }
        match self.replenish_locked(spec.id).await? {
            ReplenishOutcome::Replenished { .. } => Ok(StartupAction::Replenished),
            _ => Ok(StartupAction::Unchanged),
        }
    }

    async fn ensure_authorized(&self, alarm_id: Uuid) -> Result<()> {
        match self.scheduler.request_authorization().await? {
            Authorization::Authorized => Ok(()),
            other => {
                tracing::warn!(%alarm_id, authorization = ?other, "scheduler authorization missing");
                Err(CoreError::PermissionDenied { alarm_id })
            }
        }
    }

    /// Cancel every registered id and clear the entry. A refused cancel is
    /// logged; the id is forgotten regardless.
    async fn cancel_all_locked(&self, alarm_id: Uuid) -> Result<(usize, usize)> {
        let ids = self.registry.ids(alarm_id)?;
        let mut failures = 0;
        for id in &ids {
            if let Err(e) = self.scheduler.cancel(id).await {
                failures += 1;
                tracing::warn!(%alarm_id, instance_id = %id, error = %e, "cancel failed");
            }
        }
        self.registry.clear(alarm_id)?;
        Ok((ids.len(), failures))
    }

    async fn resync_locked(&self, spec: &AlarmSpec) -> Result<SyncReport> {
        spec.validate()?;
        let mut report = SyncReport::new(spec.id);

        let (cancelled, cancel_failures) = self.cancel_all_locked(spec.id).await?;
        report.cancelled = cancelled;
        report.cancel_failures = cancel_failures;

        if !spec.enabled {
            tracing::debug!(alarm_id = %spec.id, cancelled, "alarm disabled, nothing to register");
            return Ok(report);
        }

        self.ensure_authorized(spec.id).await?;

        let occurrences = expand(
            spec,
            self.clock.now(),
            &self.effective_horizon(),
            &self.oracle,
        );

        for occurrence in &occurrences {
            let id = Uuid::new_v4().to_string();
            let presentation = Presentation::for_alarm(spec, &id);
            let registered = match occurrence {
                Occurrence::At { at } => self.scheduler.schedule(&id, *at, &presentation).await,
                Occurrence::WeeklyRepeat { weekdays, time } => {
                    self.scheduler
                        .schedule_weekly(&id, weekdays, *time, &presentation)
                        .await
                }
            };
            match registered {
                Ok(()) => {
                    self.registry.append(spec.id, &id)?;
                    report.registered.push(id);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        alarm_id = %spec.id,
                        instant = ?occurrence.instant(),
                        error = %e,
                        "registration failed, skipping"
                    );
                }
            }
        }

        tracing::info!(
            alarm_id = %spec.id,
            mode = %spec.mode(),
            scheduler = self.scheduler.name(),
            cancelled = report.cancelled,
            registered = report.registered.len(),
            failed = report.failed,
            "alarm resynced"
        );
        Ok(report)
    }

    async fn replenish_locked(&self, alarm_id: Uuid) -> Result<ReplenishOutcome> {
        let registered = self.registry.ids(alarm_id)?;
        if registered.is_empty() {
            return Ok(ReplenishOutcome::NothingRegistered);
        }

        let live = self.scheduler.alive_ids().await?;
        let kept = self.registry.retain(alarm_id, &|id| live.contains(id))?;
        let alive = kept.len();
        let pruned = registered.len().saturating_sub(alive);
        tracing::debug!(%alarm_id, alive, pruned, "registry pruned");

        let Some(spec) = self.alarms.get(alarm_id)? else {
            tracing::warn!(%alarm_id, alive, "registrations for an alarm missing from the store");
            return Ok(ReplenishOutcome::UnknownAlarm { pruned });
        };

        if !spec.enabled {
            let (cancelled, _) = self.cancel_all_locked(alarm_id).await?;
            return Ok(ReplenishOutcome::Disabled { cancelled });
        }
        if alive >= self.min_alive {
            return Ok(ReplenishOutcome::Healthy { alive, pruned });
        }
        if self.is_exempt(&spec) {
            return Ok(ReplenishOutcome::Exempt { alive, pruned });
        }

        tracing::info!(%alarm_id, alive, min_alive = self.min_alive, "replenishing");
        let report = self.resync_locked(&spec).await?;
        Ok(ReplenishOutcome::Replenished {
            alive,
            pruned,
            report,
        })
    }
}

enum StartupAction {
    Synced,
    Replenished,
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::TimeOfDay;
    use crate::clock::FixedClock;
    use crate::registry::MemoryRegistry;
    use crate::scheduler::MemoryScheduler;
    use crate::store::MemoryAlarmStore;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::BTreeSet;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 6)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    struct Fixture {
        scheduler: Arc<MemoryScheduler>,
        registry: Arc<MemoryRegistry>,
        store: Arc<MemoryAlarmStore>,
        coordinator: SchedulingCoordinator,
    }

    fn fixture(alarms: Vec<AlarmSpec>) -> Fixture {
        let clock = Arc::new(FixedClock::new(now()));
        let scheduler = Arc::new(MemoryScheduler::new(clock.clone()));
        let registry = Arc::new(MemoryRegistry::new());
        let store = Arc::new(MemoryAlarmStore::with_alarms(alarms));
        let coordinator = SchedulingCoordinator::new(
            scheduler.clone(),
            registry.clone(),
            store.clone(),
            WorkdayOracle::weekdays_only(),
            clock,
        );
        Fixture {
            scheduler,
            registry,
            store,
            coordinator,
        }
    }

    fn monthly() -> AlarmSpec {
        AlarmSpec::new(TimeOfDay::new(7, 0).unwrap()).with_repeat(RepeatRule::Monthly {
            days: BTreeSet::from([1, 15]),
        })
    }

    #[tokio::test]
    async fn disabled_alarm_only_cancels() {
        let mut spec = monthly();
        let f = fixture(vec![spec.clone()]);
        f.coordinator.resync(&spec).await.unwrap();
        assert!(!f.registry.ids(spec.id).unwrap().is_empty());

        spec.enabled = false;
        let report = f.coordinator.resync(&spec).await.unwrap();
        assert!(report.registered.is_empty());
        assert!(report.cancelled > 0);
        assert!(f.registry.ids(spec.id).unwrap().is_empty());
        assert!(f.scheduler.registrations().is_empty());
    }

    #[tokio::test]
    async fn invalid_spec_cancels_nothing() {
        let spec = monthly();
        let f = fixture(vec![spec.clone()]);
        f.coordinator.resync(&spec).await.unwrap();
        let before = f.registry.ids(spec.id).unwrap();

        let broken = spec.clone().with_repeat(RepeatRule::Yearly { month: 13, day: 1 });
        let err = f.coordinator.resync(&broken).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(f.registry.ids(spec.id).unwrap(), before);
        assert!(f.scheduler.cancelled_ids().is_empty());
    }

    #[tokio::test]
    async fn weekly_is_exempt_only_with_native_repeat() {
        let weekly = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap()).with_repeat(RepeatRule::Weekly {
            days: BTreeSet::from([2]),
        });
        let f = fixture(vec![weekly.clone()]);
        assert!(f.coordinator.is_exempt(&weekly));

        let no_native = f.coordinator.with_horizon(HorizonPolicy {
            native_weekly: false,
            ..HorizonPolicy::default()
        });
        assert!(!no_native.is_exempt(&weekly));
        assert!(no_native.is_exempt(&AlarmSpec::new(TimeOfDay::new(7, 0).unwrap())));
    }

    #[tokio::test]
    async fn snooze_registers_follow_up_without_snooze_button() {
        let spec = monthly();
        let f = fixture(vec![spec.clone()]);
        let id = f.coordinator.snooze(spec.id, 9).await.unwrap();

        let registration = f
            .scheduler
            .registrations()
            .into_iter()
            .find(|r| r.id == id)
            .unwrap();
        assert_eq!(registration.presentation.title, "Snooze");
        assert!(registration.presentation.snooze.is_none());
        assert_eq!(
            registration.trigger,
            crate::scheduler::Trigger::Fixed {
                at: now() + Duration::minutes(9)
            }
        );
        assert_eq!(f.registry.ids(spec.id).unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn snooze_rejects_out_of_range_minutes() {
        let spec = monthly();
        let f = fixture(vec![spec.clone()]);
        for minutes in [0, 11] {
            let err = f.coordinator.snooze(spec.id, minutes).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
        assert!(f.scheduler.registrations().is_empty());
    }

    #[tokio::test]
    async fn snooze_unknown_alarm() {
        let f = fixture(vec![]);
        let missing = Uuid::new_v4();
        let err = f.coordinator.snooze(missing, 5).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownAlarm(id) if id == missing));
    }

    #[tokio::test]
    async fn stop_of_once_alarm_disables_it() {
        let spec = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap());
        let f = fixture(vec![spec.clone()]);
        let report = f.coordinator.resync(&spec).await.unwrap();
        let instance_id = report.registered[0].clone();

        let disposition = f
            .coordinator
            .handle_stop(&StopEvent {
                instance_id,
                alarm_id: spec.id,
            })
            .await
            .unwrap();
        assert!(matches!(disposition, StopDisposition::Disabled));
        assert!(!f.store.get(spec.id).unwrap().unwrap().enabled);
        assert!(f.registry.ids(spec.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_of_unknown_alarm() {
        let f = fixture(vec![]);
        let disposition = f
            .coordinator
            .handle_stop(&StopEvent {
                instance_id: "x".into(),
                alarm_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        assert!(matches!(disposition, StopDisposition::UnknownAlarm));
    }

    #[tokio::test]
    async fn preview_does_not_register() {
        let spec = monthly();
        let f = fixture(vec![spec.clone()]);
        // Feb 2026 through Feb 2027, minus Feb 1 2026 which has passed.
        let occurrences = f.coordinator.preview(&spec).unwrap();
        assert_eq!(occurrences.len(), 25);
        assert!(f.scheduler.registrations().is_empty());
    }

    #[tokio::test]
    async fn remove_cancels_everything() {
        let spec = monthly();
        let f = fixture(vec![spec.clone()]);
        let report = f.coordinator.resync(&spec).await.unwrap();
        let removed = f.coordinator.remove(spec.id).await.unwrap();
        assert_eq!(removed, report.registered.len());
        assert!(f.scheduler.registrations().is_empty());
        assert!(f.registry.alarm_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn removed_alarms_leave_no_lock_behind() {
        let first = monthly();
        let second = monthly();
        let f = fixture(vec![first.clone(), second.clone()]);
        f.coordinator.resync(&first).await.unwrap();
        f.coordinator.remove(first.id).await.unwrap();
        assert_eq!(f.coordinator.locks.len(), 0);

        f.coordinator.resync(&first).await.unwrap();
        f.coordinator.resync(&second).await.unwrap();
        assert_eq!(f.coordinator.locks.len(), 1);
    }

    #[tokio::test]
    async fn held_lock_blocks_only_its_own_alarm() {
        let first = monthly();
        let second = monthly();
        let f = fixture(vec![first.clone(), second.clone()]);
        let wait = std::time::Duration::from_secs(1);

        let lock = f.coordinator.locks.for_alarm(first.id);
        let _guard = lock.lock().await;

        let report = tokio::time::timeout(wait, f.coordinator.resync(&second))
            .await
            .expect("resync of another alarm waited on a foreign lock")
            .unwrap();
        assert!(!report.registered.is_empty());
        tokio::time::timeout(wait, f.coordinator.check_and_replenish(second.id))
            .await
            .expect("replenish of another alarm waited on a foreign lock")
            .unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            f.coordinator.resync(&first),
        )
        .await;
        assert!(blocked.is_err());
        assert!(f.registry.ids(first.id).unwrap().is_empty());
    }
}
