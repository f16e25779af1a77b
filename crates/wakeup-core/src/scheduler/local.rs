use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Weekday};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::{AlarmScheduler, Authorization, Presentation, ScheduledAlarm, Trigger};
use crate::alarm::TimeOfDay;
use crate::clock::Clock;
use crate::error::{DatabaseError, Result, SchedulerError};
use crate::events::StopEvent;
use crate::storage::database::TIMESTAMP_FORMAT;
use crate::storage::Database;

/// Scheduler persisted in the `scheduled_alarms` table.
///
/// A fixed registration stays in the table after its instant passes, until
/// it is stopped or cancelled; it is no longer reported as alive. Weekly
/// repeats are always alive.
pub struct LocalScheduler {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    authorized: bool,
    weekly: bool,
}

impl LocalScheduler {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            authorized: true,
            weekly: true,
        }
    }

    pub fn with_authorization(mut self, authorized: bool) -> Self {
        self.authorized = authorized;
        self
    }

    pub fn with_weekly_repeat(mut self, weekly: bool) -> Self {
        self.weekly = weekly;
        self
    }

    fn store(&self, id: &str, trigger: &Trigger, presentation: &Presentation) -> Result<()> {
        let fire_at = match trigger {
            Trigger::Fixed { at } => Some(at.format(TIMESTAMP_FORMAT).to_string()),
            Trigger::Weekly { .. } => None,
        };
        let trigger_json = serde_json::to_string(trigger)?;
        let presentation_json = serde_json::to_string(presentation)?;
        let created_at = self.clock.now().format(TIMESTAMP_FORMAT).to_string();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO scheduled_alarms
                    (id, alarm_id, fire_at, trigger, presentation, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    presentation.alarm_id.to_string(),
                    fire_at,
                    trigger_json,
                    presentation_json,
                    created_at,
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn query(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<ScheduledAlarm>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, trigger, presentation FROM scheduled_alarms {filter}
                 ORDER BY fire_at IS NOT NULL, fire_at, id"
            ))?;
            let rows = stmt
                .query_map(args, |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, trigger, presentation) in rows {
            let corrupt = |e: serde_json::Error| DatabaseError::CorruptRow {
                table: "scheduled_alarms".into(),
                message: format!("{id}: {e}"),
            };
            out.push(ScheduledAlarm {
                trigger: serde_json::from_str(&trigger).map_err(corrupt)?,
                presentation: serde_json::from_str(&presentation).map_err(corrupt)?,
                id,
            });
        }
        Ok(out)
    }

    /// Every stored registration, weekly repeats first then by fire time.
    pub fn registrations(&self) -> Result<Vec<ScheduledAlarm>> {
        self.query("", &[])
    }

    pub fn registrations_for(&self, alarm_id: Uuid) -> Result<Vec<ScheduledAlarm>> {
        let key = alarm_id.to_string();
        self.query("WHERE alarm_id = ?1", &[&key as &dyn rusqlite::ToSql])
    }

    /// Fixed registrations whose instant has passed and that were not
    /// stopped yet, i.e. alarms currently ringing.
    pub fn ringing(&self) -> Result<Vec<ScheduledAlarm>> {
        let now = self.clock.now().format(TIMESTAMP_FORMAT).to_string();
        self.query(
            "WHERE fire_at IS NOT NULL AND fire_at <= ?1",
            &[&now as &dyn rusqlite::ToSql],
        )
    }

    /// Dismiss a registration. Returns the stop event to feed the
    /// coordinator, or `None` when the id is unknown.
    pub fn stop(&self, instance_id: &str) -> Result<Option<StopEvent>> {
        let alarm_id = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let alarm_id = tx
                .query_row(
                    "SELECT alarm_id FROM scheduled_alarms WHERE id = ?1",
                    params![instance_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if alarm_id.is_some() {
                tx.execute(
                    "DELETE FROM scheduled_alarms WHERE id = ?1",
                    params![instance_id],
                )?;
            }
            tx.commit()?;
            Ok(alarm_id)
        })?;

        let Some(alarm_id) = alarm_id else {
            return Ok(None);
        };
        let alarm_id = Uuid::parse_str(&alarm_id).map_err(|e| DatabaseError::CorruptRow {
            table: "scheduled_alarms".into(),
            message: format!("{instance_id}: {e}"),
        })?;
        tracing::debug!(instance_id, %alarm_id, "registration stopped");
        Ok(Some(StopEvent {
            instance_id: instance_id.to_string(),
            alarm_id,
        }))
    }
}

fn unavailable(e: impl std::fmt::Display) -> SchedulerError {
    SchedulerError::Unavailable(e.to_string())
}

#[async_trait]
impl AlarmScheduler for LocalScheduler {
    fn name(&self) -> &str {
        "local"
    }

    fn supports_weekly_repeat(&self) -> bool {
        self.weekly
    }

    async fn request_authorization(&self) -> std::result::Result<Authorization, SchedulerError> {
        Ok(if self.authorized {
            Authorization::Authorized
        } else {
            Authorization::Denied
        })
    }

    async fn schedule(
        &self,
        id: &str,
        at: NaiveDateTime,
        presentation: &Presentation,
    ) -> std::result::Result<(), SchedulerError> {
        self.store(id, &Trigger::Fixed { at }, presentation)
            .map_err(|e| SchedulerError::RegistrationFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn schedule_weekly(
        &self,
        id: &str,
        weekdays: &[Weekday],
        time: TimeOfDay,
        presentation: &Presentation,
    ) -> std::result::Result<(), SchedulerError> {
        if !self.weekly {
            return Err(SchedulerError::RegistrationFailed {
                id: id.to_string(),
                reason: "weekly repeat disabled".into(),
            });
        }
        let trigger = Trigger::Weekly {
            weekdays: weekdays.to_vec(),
            time,
        };
        self.store(id, &trigger, presentation)
            .map_err(|e| SchedulerError::RegistrationFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn cancel(&self, id: &str) -> std::result::Result<(), SchedulerError> {
        self.db
            .with_conn(|conn| conn.execute("DELETE FROM scheduled_alarms WHERE id = ?1", params![id]))
            .map_err(|e| SchedulerError::CancellationFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn alive_ids(&self) -> std::result::Result<HashSet<String>, SchedulerError> {
        let now = self.clock.now().format(TIMESTAMP_FORMAT).to_string();
        self.db
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id FROM scheduled_alarms WHERE fire_at IS NULL OR fire_at > ?1",
                )?;
                let ids = stmt
                    .query_map(params![now], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<HashSet<_>>>()?;
                Ok(ids)
            })
            .map_err(unavailable)
    }
}
