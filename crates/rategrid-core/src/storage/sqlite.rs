//! SQLite-backed record store.
//!
//! Holds the property catalog and the per-date availability and rate series.
//! Dates are stored as `YYYY-MM-DD` text so range queries compare lexically.

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::migrations;
use super::{Config, RecordStore};
use crate::error::{Result as CoreResult, StoreError};
use crate::model::{
    AvailabilityRecord, DailyRecord, DateRange, NewAvailability, NewRate, Property, RatePlan,
    RateRecord, RecordId, RoomType, RowKind,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite database for the property catalog and inventory series.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open the database named by `config`, resolving a relative path
    /// against the data directory.
    ///
    /// # Errors
    /// [`crate::CoreError::Config`] when the data directory is unusable,
    /// [`crate::CoreError::Store`] when the database cannot be opened.
    pub fn open_configured(config: &Config) -> CoreResult<Self> {
        let path = config.database_path()?;
        Ok(Self::open(&path)?)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection poisoned".into()))
    }

    /// Insert or replace a property.
    pub fn upsert_property(&self, property: &Property) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO properties (id, title, channel_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, channel_id = excluded.channel_id",
            params![property.id, property.title, property.channel_id],
        )?;
        Ok(())
    }

    /// Insert or replace a room type. The property must exist.
    pub fn upsert_room_type(&self, room_type: &RoomType) -> Result<(), StoreError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "properties", "property", &room_type.property_id)?;
        conn.execute(
            "INSERT INTO room_types (id, property_id, title, room_count, channel_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET property_id = excluded.property_id,
                title = excluded.title, room_count = excluded.room_count,
                channel_id = excluded.channel_id",
            params![
                room_type.id,
                room_type.property_id,
                room_type.title,
                room_type.room_count,
                room_type.channel_id,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a rate plan. The room type must exist.
    pub fn upsert_rate_plan(&self, rate_plan: &RatePlan) -> Result<(), StoreError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "room_types", "room type", &rate_plan.room_type_id)?;
        conn.execute(
            "INSERT INTO rate_plans (id, room_type_id, title, code, channel_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET room_type_id = excluded.room_type_id,
                title = excluded.title, code = excluded.code, channel_id = excluded.channel_id",
            params![
                rate_plan.id,
                rate_plan.room_type_id,
                rate_plan.title,
                rate_plan.code,
                rate_plan.channel_id,
            ],
        )?;
        Ok(())
    }
}

fn ensure_exists(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    id: &str,
) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound {
            entity,
            id: id.to_string(),
        }),
    }
}

fn parse_date(idx: usize, text: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch_property(&self, property_id: &str) -> Result<Property, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, title, channel_id FROM properties WHERE id = ?1",
            params![property_id],
            |row| {
                Ok(Property {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    channel_id: row.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "property",
            id: property_id.to_string(),
        })
    }

    async fn fetch_room_types(&self, property_id: &str) -> Result<Vec<RoomType>, StoreError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "properties", "property", property_id)?;
        let mut stmt = conn.prepare(
            "SELECT id, property_id, title, room_count, channel_id
             FROM room_types WHERE property_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![property_id], |row| {
            Ok(RoomType {
                id: row.get(0)?,
                property_id: row.get(1)?,
                title: row.get(2)?,
                room_count: row.get(3)?,
                channel_id: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn fetch_rate_plans(&self, room_type_id: &str) -> Result<Vec<RatePlan>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, room_type_id, title, code, channel_id
             FROM rate_plans WHERE room_type_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![room_type_id], |row| {
            Ok(RatePlan {
                id: row.get(0)?,
                room_type_id: row.get(1)?,
                title: row.get(2)?,
                code: row.get(3)?,
                channel_id: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn fetch_availability(
        &self,
        room_type_id: &str,
        range: DateRange,
    ) -> Result<Vec<AvailabilityRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, date, value FROM availability
             WHERE room_type_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![room_type_id, format_date(range.start), format_date(range.end)],
            |row| {
                Ok(DailyRecord {
                    record_id: row.get(0)?,
                    date: parse_date(1, row.get(1)?)?,
                    value: row.get(2)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn fetch_rates(
        &self,
        rate_plan_id: &str,
        range: DateRange,
    ) -> Result<Vec<RateRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, date, value FROM rates
             WHERE rate_plan_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![rate_plan_id, format_date(range.start), format_date(range.end)],
            |row| {
                Ok(DailyRecord {
                    record_id: row.get(0)?,
                    date: parse_date(1, row.get(1)?)?,
                    value: row.get(2)?,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn create_availability(
        &self,
        record: &NewAvailability,
    ) -> Result<RecordId, StoreError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "room_types", "room type", &record.room_type_id)?;
        conn.execute(
            "INSERT INTO availability (room_type_id, date, value) VALUES (?1, ?2, ?3)",
            params![record.room_type_id, format_date(record.date), record.value],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateRecord {
                    kind: RowKind::Availability,
                    owner: record.room_type_id.clone(),
                    date: record.date,
                }
            } else {
                e.into()
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    async fn update_availability(
        &self,
        record_id: RecordId,
        value: u32,
    ) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE availability SET value = ?1 WHERE id = ?2",
            params![value, record_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "availability record",
                id: record_id.to_string(),
            });
        }
        Ok(())
    }

    async fn create_rate(&self, record: &NewRate) -> Result<RecordId, StoreError> {
        let conn = self.conn()?;
        ensure_exists(&conn, "rate_plans", "rate plan", &record.rate_plan_id)?;
        conn.execute(
            "INSERT INTO rates (rate_plan_id, date, value) VALUES (?1, ?2, ?3)",
            params![record.rate_plan_id, format_date(record.date), record.value],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateRecord {
                    kind: RowKind::Rate,
                    owner: record.rate_plan_id.clone(),
                    date: record.date,
                }
            } else {
                e.into()
            }
        })?;
        Ok(conn.last_insert_rowid())
    }

    async fn update_rate(&self, record_id: RecordId, value: f64) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE rates SET value = ?1 WHERE id = ?2",
            params![value, record_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "rate record",
                id: record_id.to_string(),
            });
        }
        Ok(())
    }
}
