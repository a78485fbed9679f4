//! Folder domain types.
//!
//! A [`FolderNode`] describes one mailbox folder on either side of a copy.
//! Nodes are plain values: every protocol operation on them goes through the
//! [`MailStore`](crate::providers::store::MailStore) that produced them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a folder is able to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderKind {
    /// Whether the folder can hold messages.
    pub holds_messages: bool,
    /// Whether the folder can hold subfolders.
    pub holds_folders: bool,
}

impl FolderKind {
    /// A folder that holds both messages and subfolders.
    pub const MIXED: Self = Self {
        holds_messages: true,
        holds_folders: true,
    };

    /// A folder that only holds messages.
    pub const MESSAGES_ONLY: Self = Self {
        holds_messages: true,
        holds_folders: false,
    };

    /// A folder that only holds subfolders.
    pub const FOLDERS_ONLY: Self = Self {
        holds_messages: false,
        holds_folders: true,
    };
}

impl Default for FolderKind {
    fn default() -> Self {
        Self::MIXED
    }
}

/// Access mode used when opening a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Messages can be listed but the folder is not modified.
    ReadOnly,
    /// Messages can be appended.
    ReadWrite,
}

/// One folder of a mail store.
///
/// The root (default) folder of a store has an empty full name and never
/// holds messages itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderNode {
    full_name: String,
    name: String,
    kind: FolderKind,
    exists: bool,
}

impl FolderNode {
    /// Creates the root folder of a store.
    pub fn root() -> Self {
        Self {
            full_name: String::new(),
            name: String::new(),
            kind: FolderKind::FOLDERS_ONLY,
            exists: true,
        }
    }

    /// Creates a node for a folder.
    ///
    /// `name` is the last component of `full_name`.
    pub fn new(
        full_name: impl Into<String>,
        name: impl Into<String>,
        kind: FolderKind,
        exists: bool,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            name: name.into(),
            kind,
            exists,
        }
    }

    /// Full hierarchical name, e.g. `INBOX/Work`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last component of the hierarchical name, e.g. `Work`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Folder type flags.
    pub fn kind(&self) -> FolderKind {
        self.kind
    }

    /// Whether the folder exists on its store.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Whether this is the root folder of its store.
    pub fn is_root(&self) -> bool {
        self.full_name.is_empty()
    }

    /// Returns this node marked as existing with the given kind.
    pub fn created(self, kind: FolderKind) -> Self {
        Self {
            kind,
            exists: true,
            ..self
        }
    }
}

impl fmt::Display for FolderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.full_name)
        }
    }
}
