//! Alarm list storage.
//!
//! The engine reads alarms from here before every resync and flips
//! `enabled` off when a one-shot alarm is dismissed.

use std::collections::BTreeMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::alarm::AlarmSpec;
use crate::error::Result;

pub trait AlarmStore: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<AlarmSpec>>;

    /// All alarms, ordered by time of day.
    fn list(&self) -> Result<Vec<AlarmSpec>>;

    fn upsert(&self, alarm: &AlarmSpec) -> Result<()>;

    /// Returns whether the alarm existed.
    fn delete(&self, id: Uuid) -> Result<bool>;

    /// Returns whether the alarm existed.
    fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool>;

    fn list_enabled(&self) -> Result<Vec<AlarmSpec>> {
        Ok(self.list()?.into_iter().filter(|a| a.enabled).collect())
    }
}

/// Process-local alarm list.
#[derive(Debug, Default)]
pub struct MemoryAlarmStore {
    alarms: Mutex<BTreeMap<Uuid, AlarmSpec>>,
}

impl MemoryAlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alarms(alarms: impl IntoIterator<Item = AlarmSpec>) -> Self {
        Self {
            alarms: Mutex::new(alarms.into_iter().map(|a| (a.id, a)).collect()),
        }
    }

    fn alarms(&self) -> std::sync::MutexGuard<'_, BTreeMap<Uuid, AlarmSpec>> {
        self.alarms.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AlarmStore for MemoryAlarmStore {
    fn get(&self, id: Uuid) -> Result<Option<AlarmSpec>> {
        Ok(self.alarms().get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<AlarmSpec>> {
        let mut alarms: Vec<AlarmSpec> = self.alarms().values().cloned().collect();
        alarms.sort_by_key(|a| a.time);
        Ok(alarms)
    }

    fn upsert(&self, alarm: &AlarmSpec) -> Result<()> {
        self.alarms().insert(alarm.id, alarm.clone());
        Ok(())
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.alarms().remove(&id).is_some())
    }

    fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        match self.alarms().get_mut(&id) {
            Some(alarm) => {
                alarm.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::TimeOfDay;

    #[test]
    fn list_is_ordered_by_time() {
        let late = AlarmSpec::new(TimeOfDay::new(9, 0).unwrap());
        let early = AlarmSpec::new(TimeOfDay::new(6, 30).unwrap());
        let store = MemoryAlarmStore::with_alarms([late.clone(), early.clone()]);
        let ids: Vec<Uuid> = store.list().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[test]
    fn set_enabled_filters_enabled_list() {
        let alarm = AlarmSpec::new(TimeOfDay::new(7, 0).unwrap());
        let store = MemoryAlarmStore::with_alarms([alarm.clone()]);
        assert!(store.set_enabled(alarm.id, false).unwrap());
        assert!(store.list_enabled().unwrap().is_empty());
        assert!(!store.set_enabled(Uuid::new_v4(), true).unwrap());
    }
}
