//! Mail store provider implementations.
//!
//! This module contains the store abstraction the copy services work against
//! and its implementations:
//!
//! - [`store`] - The [`MailStore`](store::MailStore) trait, the IMAP adapter and
//!   an in-memory store

pub mod store;
