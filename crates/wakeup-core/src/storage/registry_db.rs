//! SQLite-backed instance registry.

use std::sync::Arc;

use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::error::{CoreError, DatabaseError, Result};
use crate::registry::InstanceRegistry;

/// Registry persisted in the `instance_registry` table.
///
/// Every read-modify-write runs in one transaction while the connection
/// lock is held.
pub struct RegistryDb {
    db: Arc<Database>,
}

impl RegistryDb {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn select_ids(conn: &rusqlite::Connection, alarm_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT instance_id FROM instance_registry WHERE alarm_id = ?1 ORDER BY position",
    )?;
    let ids = stmt
        .query_map(params![alarm_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

impl InstanceRegistry for RegistryDb {
    fn ids(&self, alarm_id: Uuid) -> Result<Vec<String>> {
        let key = alarm_id.to_string();
        Ok(self.db.with_conn(|conn| select_ids(conn, &key))?)
    }

    fn append(&self, alarm_id: Uuid, instance_id: &str) -> Result<()> {
        let key = alarm_id.to_string();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO instance_registry (alarm_id, position, instance_id)
                 SELECT ?1, COALESCE(MAX(position), -1) + 1, ?2
                 FROM instance_registry WHERE alarm_id = ?1",
                params![key, instance_id],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn replace(&self, alarm_id: Uuid, ids: Vec<String>) -> Result<()> {
        let key = alarm_id.to_string();
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM instance_registry WHERE alarm_id = ?1",
                params![key],
            )?;
            {
                let mut insert = tx.prepare(
                    "INSERT OR IGNORE INTO instance_registry (alarm_id, position, instance_id)
                     VALUES (?1, ?2, ?3)",
                )?;
                for (position, id) in ids.iter().enumerate() {
                    insert.execute(params![key, position as i64, id])?;
                }
            }
            tx.commit()
        })?;
        Ok(())
    }

    fn retain(&self, alarm_id: Uuid, keep: &(dyn Fn(&str) -> bool + Sync)) -> Result<Vec<String>> {
        let key = alarm_id.to_string();
        let kept = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let current = select_ids(&tx, &key)?;
            let (kept, dropped): (Vec<String>, Vec<String>) =
                current.into_iter().partition(|id| keep(id.as_str()));
            {
                let mut delete = tx.prepare(
                    "DELETE FROM instance_registry WHERE alarm_id = ?1 AND instance_id = ?2",
                )?;
                for id in &dropped {
                    delete.execute(params![key, id])?;
                }
            }
            tx.commit()?;
            Ok(kept)
        })?;
        Ok(kept)
    }

    fn alarm_ids(&self) -> Result<Vec<Uuid>> {
        let raw = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT alarm_id FROM instance_registry ORDER BY alarm_id")?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        raw.iter()
            .map(|s| {
                Uuid::parse_str(s).map_err(|e| {
                    CoreError::from(DatabaseError::CorruptRow {
                        table: "instance_registry".into(),
                        message: format!("alarm_id {s:?}: {e}"),
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RegistryDb {
        RegistryDb::new(Arc::new(Database::open_memory().unwrap()))
    }

    #[test]
    fn append_keeps_insertion_order() {
        let reg = registry();
        let alarm = Uuid::new_v4();
        for id in ["c", "a", "b"] {
            reg.append(alarm, id).unwrap();
        }
        assert_eq!(reg.ids(alarm).unwrap(), vec!["c", "a", "b"]);
        assert_eq!(reg.alarm_ids().unwrap(), vec![alarm]);
    }

    #[test]
    fn replace_and_clear() {
        let reg = registry();
        let alarm = Uuid::new_v4();
        reg.append(alarm, "old").unwrap();
        reg.replace(alarm, vec!["x".into(), "y".into()]).unwrap();
        assert_eq!(reg.ids(alarm).unwrap(), vec!["x", "y"]);
        reg.append(alarm, "z").unwrap();
        assert_eq!(reg.ids(alarm).unwrap(), vec!["x", "y", "z"]);

        reg.clear(alarm).unwrap();
        assert!(reg.ids(alarm).unwrap().is_empty());
        assert!(reg.alarm_ids().unwrap().is_empty());
    }

    #[test]
    fn retain_prunes_in_place() {
        let reg = registry();
        let alarm = Uuid::new_v4();
        let other = Uuid::new_v4();
        reg.replace(alarm, vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        reg.append(other, "a").unwrap();

        let kept = reg.retain(alarm, &|id| id != "b").unwrap();
        assert_eq!(kept, vec!["a", "c"]);
        assert_eq!(reg.ids(alarm).unwrap(), vec!["a", "c"]);
        assert_eq!(reg.ids(other).unwrap(), vec!["a"]);
    }

    #[test]
    fn entries_are_independent_per_alarm() {
        let reg = registry();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        reg.append(a, "1").unwrap();
        reg.append(b, "1").unwrap();
        reg.clear(a).unwrap();
        assert_eq!(reg.ids(b).unwrap(), vec!["1"]);
    }
}
