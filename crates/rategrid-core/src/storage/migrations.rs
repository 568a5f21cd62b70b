//! Database schema migrations for rategrid.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: property catalog.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS properties (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            channel_id  TEXT
        );

        CREATE TABLE IF NOT EXISTS room_types (
            id          TEXT PRIMARY KEY,
            property_id TEXT NOT NULL REFERENCES properties(id),
            title       TEXT NOT NULL,
            room_count  INTEGER NOT NULL DEFAULT 0,
            channel_id  TEXT
        );

        CREATE TABLE IF NOT EXISTS rate_plans (
            id           TEXT PRIMARY KEY,
            room_type_id TEXT NOT NULL REFERENCES room_types(id),
            title        TEXT NOT NULL,
            code         TEXT,
            channel_id   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_room_types_property ON room_types(property_id);
        CREATE INDEX IF NOT EXISTS idx_rate_plans_room_type ON rate_plans(room_type_id);",
    )?;
    set_schema_version(conn, 1)
}

/// Migration v2: per-date availability and rate series.
///
/// At most one record per (owner, date); the UNIQUE constraints enforce it.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS availability (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            room_type_id TEXT NOT NULL REFERENCES room_types(id),
            date         TEXT NOT NULL,
            value        INTEGER NOT NULL,
            UNIQUE(room_type_id, date)
        );

        CREATE TABLE IF NOT EXISTS rates (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            rate_plan_id TEXT NOT NULL REFERENCES rate_plans(id),
            date         TEXT NOT NULL,
            value        REAL NOT NULL,
            UNIQUE(rate_plan_id, date)
        );",
    )?;
    set_schema_version(conn, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('properties', 'room_types', 'rate_plans', 'availability', 'rates')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}
