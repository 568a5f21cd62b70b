//! Channel-manager synchronization layer.
//!
//! Saved rows are tracked as dirty until the channel manager confirms a
//! push. A push sends the row's whole loaded series as compressed date
//! ranges, never the individual edits.

pub mod adapter;
pub mod channel_client;
pub mod compress;
pub mod credentials;
pub mod eligibility;
pub mod tracker;

#[cfg(test)]
mod channel_client_tests;
#[cfg(test)]
mod compress_tests;

pub use adapter::{payload_for, row_eligibility, RowSyncer, SyncOutcome};
pub use channel_client::{ChannelManager, HttpChannelManager, SyncPayload};
pub use compress::{compress, expand, CompressedRange};
pub use credentials::{keyring_store, API_KEY_ENTRY};
pub use eligibility::{check_eligibility, DisabledReason, SyncContext, SyncEligibility};
pub use tracker::SyncStateTracker;
