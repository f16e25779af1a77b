//! Schema of `wakeup.db`.
//!
//! [`migrate`] runs on every open and brings the file up to
//! [`SCHEMA_VERSION`], recorded in the single-row `schema_version` table.

use rusqlite::{Connection, Result as SqliteResult};

/// Version written by the newest `migrate_vN`.
pub const SCHEMA_VERSION: i32 = 1;

/// Run every `migrate_vN` newer than the stored version.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    ensure_version_table(conn)?;

    if get_schema_version(conn) < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn ensure_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Stored version, 0 for a new file.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn record_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute_batch("DELETE FROM schema_version;")?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map(|_| ())
}

/// Migration v1: baseline schema.
///
/// - `alarms`: the alarm list
/// - `instance_registry`: one row per registered scheduler id, ordered by
///   `position` within its alarm
/// - `scheduled_alarms`: registrations held by the local scheduler; weekly
///   repeats have no `fire_at`
/// - `kv`: application state
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS alarms (
            id             TEXT PRIMARY KEY,
            label          TEXT NOT NULL DEFAULT '',
            sound_name     TEXT NOT NULL DEFAULT '',
            time           TEXT NOT NULL,
            enabled        INTEGER NOT NULL DEFAULT 1,
            repeat         TEXT NOT NULL DEFAULT '{\"mode\":\"once\"}',
            snooze_enabled INTEGER NOT NULL DEFAULT 1,
            snooze_minutes INTEGER NOT NULL DEFAULT 5,
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS instance_registry (
            alarm_id    TEXT NOT NULL,
            position    INTEGER NOT NULL,
            instance_id TEXT NOT NULL,
            PRIMARY KEY (alarm_id, instance_id)
        );

        CREATE TABLE IF NOT EXISTS scheduled_alarms (
            id           TEXT PRIMARY KEY,
            alarm_id     TEXT NOT NULL,
            fire_at      TEXT,
            trigger      TEXT NOT NULL,
            presentation TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_registry_alarm_position ON instance_registry(alarm_id, position);
        CREATE INDEX IF NOT EXISTS idx_scheduled_fire_at ON scheduled_alarms(fire_at);
        CREATE INDEX IF NOT EXISTS idx_scheduled_alarm_id ON scheduled_alarms(alarm_id);",
    )?;

    record_version(&tx, 1)?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn fresh_database_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_version_table(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 0);
    }
}
