//! SQLite-backed alarm list.

use std::sync::Arc;

use chrono::Local;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::database::TIMESTAMP_FORMAT;
use super::Database;
use crate::alarm::{AlarmSpec, RepeatRule, Snooze, TimeOfDay};
use crate::error::{DatabaseError, Result};
use crate::store::AlarmStore;

const SELECT_COLUMNS: &str =
    "SELECT id, label, sound_name, time, enabled, repeat, snooze_enabled, snooze_minutes FROM alarms";

/// Raw `alarms` row, decoded after the connection lock is released.
struct AlarmRow {
    id: String,
    label: String,
    sound_name: String,
    time: String,
    enabled: bool,
    repeat: String,
    snooze_enabled: bool,
    snooze_minutes: u32,
}

impl AlarmRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            label: row.get(1)?,
            sound_name: row.get(2)?,
            time: row.get(3)?,
            enabled: row.get(4)?,
            repeat: row.get(5)?,
            snooze_enabled: row.get(6)?,
            snooze_minutes: row.get(7)?,
        })
    }

    fn into_spec(self) -> std::result::Result<AlarmSpec, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            table: "alarms".into(),
            message,
        };
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("id {:?}: {e}", self.id)))?;
        let time = self
            .time
            .parse::<TimeOfDay>()
            .map_err(|e| corrupt(format!("alarm {id}: {e}")))?;
        let repeat: RepeatRule = serde_json::from_str(&self.repeat)
            .map_err(|e| corrupt(format!("alarm {id} repeat: {e}")))?;
        Ok(AlarmSpec {
            id,
            label: self.label,
            sound_name: self.sound_name,
            time,
            enabled: self.enabled,
            repeat,
            snooze: Snooze {
                enabled: self.snooze_enabled,
                minutes: self.snooze_minutes,
            },
        })
    }
}

/// Alarm list persisted in the `alarms` table.
pub struct AlarmDb {
    db: Arc<Database>,
}

impl AlarmDb {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl AlarmStore for AlarmDb {
    fn get(&self, id: Uuid) -> Result<Option<AlarmSpec>> {
        let key = id.to_string();
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![key],
                AlarmRow::from_row,
            )
            .optional()
        })?;
        Ok(row.map(AlarmRow::into_spec).transpose()?)
    }

    fn list(&self) -> Result<Vec<AlarmSpec>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY time, created_at"))?;
            let rows = stmt
                .query_map([], AlarmRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        let mut alarms = Vec::with_capacity(rows.len());
        for row in rows {
            alarms.push(row.into_spec()?);
        }
        Ok(alarms)
    }

    fn upsert(&self, alarm: &AlarmSpec) -> Result<()> {
        let repeat = serde_json::to_string(&alarm.repeat)?;
        let now = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO alarms (id, label, sound_name, time, enabled, repeat,
                                     snooze_enabled, snooze_minutes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    label = excluded.label,
                    sound_name = excluded.sound_name,
                    time = excluded.time,
                    enabled = excluded.enabled,
                    repeat = excluded.repeat,
                    snooze_enabled = excluded.snooze_enabled,
                    snooze_minutes = excluded.snooze_minutes,
                    updated_at = excluded.updated_at",
                params![
                    alarm.id.to_string(),
                    alarm.label,
                    alarm.sound_name,
                    alarm.time.to_string(),
                    alarm.enabled,
                    repeat,
                    alarm.snooze.enabled,
                    alarm.snooze.minutes,
                    now,
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        let key = id.to_string();
        let n = self
            .db
            .with_conn(|conn| conn.execute("DELETE FROM alarms WHERE id = ?1", params![key]))?;
        Ok(n > 0)
    }

    fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool> {
        let key = id.to_string();
        let now = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        let n = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE alarms SET enabled = ?2, updated_at = ?3 WHERE id = ?1",
                params![key, enabled, now],
            )
        })?;
        Ok(n > 0)
    }
}
