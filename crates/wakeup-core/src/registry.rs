//! Alarm id to external scheduler id bookkeeping.
//!
//! The registry only records what was registered. Ids go stale as instants
//! fire; they are pruned lazily by the replenishment check, never eagerly.
//! Every mutation is an atomic read-modify-write on one alarm's entry.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::Result;

pub trait InstanceRegistry: Send + Sync {
    /// Registered ids for `alarm_id`, in insertion order.
    fn ids(&self, alarm_id: Uuid) -> Result<Vec<String>>;

    /// Append one id, creating the entry if needed.
    fn append(&self, alarm_id: Uuid, instance_id: &str) -> Result<()>;

    /// Replace the whole entry. An empty list removes it.
    fn replace(&self, alarm_id: Uuid, ids: Vec<String>) -> Result<()>;

    /// Remove the entry.
    fn clear(&self, alarm_id: Uuid) -> Result<()> {
        self.replace(alarm_id, Vec::new())
    }

    /// Keep only ids matching `keep`, returning the kept ids.
    fn retain(&self, alarm_id: Uuid, keep: &(dyn Fn(&str) -> bool + Sync)) -> Result<Vec<String>>;

    /// Alarms that currently have an entry.
    fn alarm_ids(&self) -> Result<Vec<Uuid>>;
}

/// Process-local registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Mutex<HashMap<Uuid, Vec<String>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Vec<String>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl InstanceRegistry for MemoryRegistry {
    fn ids(&self, alarm_id: Uuid) -> Result<Vec<String>> {
        Ok(self.entries().get(&alarm_id).cloned().unwrap_or_default())
    }

    fn append(&self, alarm_id: Uuid, instance_id: &str) -> Result<()> {
        self.entries()
            .entry(alarm_id)
            .or_default()
            .push(instance_id.to_string());
        Ok(())
    }

    fn replace(&self, alarm_id: Uuid, ids: Vec<String>) -> Result<()> {
        let mut entries = self.entries();
        if ids.is_empty() {
            entries.remove(&alarm_id);
        } else {
            entries.insert(alarm_id, ids);
        }
        Ok(())
    }

    fn retain(&self, alarm_id: Uuid, keep: &(dyn Fn(&str) -> bool + Sync)) -> Result<Vec<String>> {
        let mut entries = self.entries();
        let Some(ids) = entries.get_mut(&alarm_id) else {
            return Ok(Vec::new());
        };
        ids.retain(|id| keep(id));
        let kept = ids.clone();
        if kept.is_empty() {
            entries.remove(&alarm_id);
        }
        Ok(kept)
    }

    fn alarm_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self.entries().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn append_preserves_order() {
        let registry = MemoryRegistry::new();
        let alarm = Uuid::new_v4();
        registry.append(alarm, "a").unwrap();
        registry.append(alarm, "b").unwrap();
        assert_eq!(registry.ids(alarm).unwrap(), vec!["a", "b"]);
        assert_eq!(registry.alarm_ids().unwrap(), vec![alarm]);
    }

    #[test]
    fn retain_prunes_and_drops_empty_entries() {
        let registry = MemoryRegistry::new();
        let alarm = Uuid::new_v4();
        registry
            .replace(alarm, vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        let kept = registry.retain(alarm, &|id| id == "b").unwrap();
        assert_eq!(kept, vec!["b"]);
        assert_eq!(registry.ids(alarm).unwrap(), vec!["b"]);

        registry.retain(alarm, &|_| false).unwrap();
        assert!(registry.alarm_ids().unwrap().is_empty());
    }

    #[test]
    fn clear_removes_entry() {
        let registry = MemoryRegistry::new();
        let alarm = Uuid::new_v4();
        registry.append(alarm, "a").unwrap();
        registry.clear(alarm).unwrap();
        assert!(registry.ids(alarm).unwrap().is_empty());
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let registry = Arc::new(MemoryRegistry::new());
        let alarm = Uuid::new_v4();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        registry.append(alarm, &format!("{t}-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.ids(alarm).unwrap().len(), 400);
    }
}
