//! Mailprobe Store - durable state for resumable probing runs.
//!
//! - [`cache`] - append-only availability set and reputation map
//! - [`pending`] - the operator's pending-work list and completion tracking
//! - [`sinks`] - per-run result files
//!
//! Everything is plain newline-delimited text so the operator can inspect
//! and edit it between runs.

pub mod cache;
pub mod error;
pub mod lines;
pub mod pending;
pub mod sinks;

pub use cache::CacheStore;
pub use error::{Result, StoreError};
pub use pending::{CompletionTracker, PendingEntry, PendingList};
pub use sinks::{AvailabilitySinks, LineSink, ReputationSinks, RunDirectory};
