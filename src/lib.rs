//! mailmirror - Mirror one mail account into another
//!
//! This crate copies the complete folder hierarchy and message contents of a
//! source mail account into a target account, including the store adapters
//! for IMAP and an in-memory store, progress reporting and cancellation.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;

pub use services::{CopyError, CopyHandle, CopyReport, CopySession};
