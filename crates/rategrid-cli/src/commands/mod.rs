pub mod auth;
pub mod catalog;
pub mod config;
pub mod grid;
pub mod session;

use chrono::NaiveDate;
use rategrid_core::{Config, SqliteRecordStore};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Single-threaded runtime for the async core calls of one command.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Clap value parser for `YYYY-MM-DD` dates.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}

pub fn open_store(config: &Config) -> Result<SqliteRecordStore, Box<dyn std::error::Error>> {
    Ok(SqliteRecordStore::open_configured(config)?)
}
