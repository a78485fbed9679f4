//! Mail store implementations.
//!
//! This module contains the [`MailStore`] and [`StoreConnector`] traits and
//! their implementations:
//!
//! - [`ImapConnector`] / [`ImapStore`] - IMAP and IMAPS accounts
//! - [`MemoryConnector`] / [`MemoryStore`] - accounts held in memory
//!
//! # Architecture
//!
//! The copy services only see the traits. A connector turns a
//! [`StoreUrl`](crate::domain::StoreUrl) into a boxed store connection, which
//! the copy session owns for the whole run and closes exactly once.
//!
//! # Example
//!
//! ```ignore
//! use mailmirror::domain::StoreUrl;
//! use mailmirror::providers::store::{ImapConnector, StoreConnector};
//!
//! async fn top_level_folders(url: &str) -> anyhow::Result<Vec<String>> {
//!     let url = StoreUrl::parse(url)?;
//!     let mut store = ImapConnector::default().connect(&url).await?;
//!     let root = store.root();
//!     let names = store
//!         .list(&root)
//!         .await?
//!         .iter()
//!         .map(|f| f.full_name().to_string())
//!         .collect();
//!     store.close().await?;
//!     Ok(names)
//! }
//! ```

mod imap;
mod memory;
mod traits;

pub use imap::{ImapConnector, ImapOptions, ImapSecurity, ImapStore};
pub use memory::{MemoryAccount, MemoryConnector, MemoryStore, StoreCall, MEMORY_PROTOCOL};
pub use traits::{FolderMessages, MailStore, Result, StoreConnector, StoreError};
