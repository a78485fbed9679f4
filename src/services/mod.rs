//! Copy services layer.
//!
//! This module contains the services that run a copy, coordinating between
//! the store providers and the domain types.
//!
//! # Architecture
//!
//! ```text
//! Caller (binary, embedding application)
//!          |
//!          v
//!    CopySession  -- connects, closes, START/END
//!          |
//!          v
//!   FolderReplicator  -- tree walk, folder events
//!          |
//!          v
//! Store providers (MailStore)
//! ```
//!
//! # Services Overview
//!
//! - [`CopySession`]: Runs one copy inline or as a cancellable background task
//! - [`FolderReplicator`]: Mirrors a source folder tree into a target store
//! - [`ProgressObserver`]: Receives folder and lifecycle events during a copy
//! - [`CopyReport`]: Counts and absorbed failures of a finished copy

mod progress;
mod replicator;
mod report;
mod session;

pub use progress::{ChannelObserver, NoopObserver, ProgressObserver, TracingObserver};
pub use replicator::FolderReplicator;
pub use report::{CopyReport, FailureStage, FolderFailure};
pub use session::{CopyError, CopyHandle, CopySession, StoreRole};
