//! Domain layer types for mailmirror.
//!
//! This module contains the values that flow between the store adapters and
//! the copy services: store URLs, folder nodes, messages and progress events.

mod event;
mod folder;
mod message;
mod store_url;

pub use event::{LifecyclePhase, ProgressEvent};
pub use folder::{FolderKind, FolderNode, OpenMode};
pub use message::Message;
pub use store_url::{StoreUrl, UrlError};
