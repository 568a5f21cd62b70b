//! # Rategrid Core Library
//!
//! This library provides the core logic behind rategrid, an inventory and
//! rate grid for a property-management system. Operators edit per-date
//! availability and rates; edits are saved in batches and pushed to an
//! external channel manager as compressed date ranges.
//!
//! ## Architecture
//!
//! - **Grid**: a dense, date-complete view assembled from a record store
//! - **Ledger**: pending cell edits, validated as they are typed
//! - **Reconcile**: batched, best-effort persistence with per-item reports
//! - **Sync**: dirty-row tracking, range compression and the channel client
//! - **Storage**: SQLite and in-memory record stores, TOML configuration
//!
//! ## Key Components
//!
//! - [`GridAssembler`]: builds an [`InventoryGrid`] from a [`RecordStore`]
//! - [`EditLedger`]: keyed map of pending edits
//! - [`Reconciler`]: turns ledger edits into store writes
//! - [`RowSyncer`]: pushes one row to a [`ChannelManager`]
//! - [`EditSession`]: owns grid, ledger and tracker for one operator

pub mod error;
pub mod grid;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod sync;

pub use error::{
    CommitError, ConfigError, CoreError, GridError, StoreError, SyncError, ValidationError,
};
pub use grid::{GridAssembler, GridFilter, InventoryGrid};
pub use ledger::{CellEdit, EditLedger, LedgerSnapshot, ValidationPolicy};
pub use model::{
    CellKey, CellValue, DateRange, DirtyRowKey, Property, RatePlan, RecordId, RoomType, RowKey,
    RowKind, SENTINEL_RECORD_ID,
};
pub use reconcile::{BatchQueue, CommitReport, Reconciler};
pub use session::EditSession;
pub use storage::{CachedRecordStore, Config, MemoryRecordStore, RecordStore, SqliteRecordStore};
pub use sync::{
    ChannelManager, CompressedRange, DisabledReason, HttpChannelManager, RowSyncer,
    SyncEligibility, SyncStateTracker,
};
