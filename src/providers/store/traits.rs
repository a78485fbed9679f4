//! Mail store trait definitions.
//!
//! This module defines the [`MailStore`] trait which abstracts over one
//! authenticated connection to a mail account, and the [`StoreConnector`]
//! trait which opens such connections from a [`StoreUrl`].

use async_trait::async_trait;

use crate::domain::{FolderKind, FolderNode, Message, OpenMode, StoreUrl};

/// Result type alias for mail store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during mail store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No store implementation is registered for the protocol.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Requested folder was not found.
    #[error("folder not found: {0}")]
    NotFound(String),

    /// A folder could not be opened, listed or created.
    #[error("folder error: {0}")]
    Folder(String),

    /// One or more messages could not be appended.
    #[error("append failed: {0}")]
    Append(String),

    /// The server answered with something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation did not complete in time.
    #[error("timed out: {0}")]
    Timeout(String),
}

/// One authenticated connection to a mail account.
///
/// Every operation takes `&mut self`: a store session executes one command at
/// a time. Folder nodes handed to a store must come from the same store.
///
/// # Example
///
/// ```ignore
/// use mailmirror::providers::store::MailStore;
///
/// async fn count_top_level(store: &mut dyn MailStore) -> Result<usize> {
///     let root = store.root();
///     Ok(store.list(&root).await?.len())
/// }
/// ```
#[async_trait]
pub trait MailStore: Send {
    /// Returns the default (root) folder of the store.
    fn root(&self) -> FolderNode;

    /// Lists the immediate children of a folder, in the order the store
    /// reports them.
    async fn list(&mut self, folder: &FolderNode) -> Result<Vec<FolderNode>>;

    /// Resolves the child of `parent` called `name`.
    ///
    /// The returned node reports through [`FolderNode::exists`] whether the
    /// folder is present on the store.
    async fn child(&mut self, parent: &FolderNode, name: &str) -> Result<FolderNode>;

    /// Creates a folder with the given type flags.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Folder`] if the folder cannot be created,
    /// including when it already exists.
    async fn create(&mut self, folder: &FolderNode, kind: FolderKind) -> Result<FolderNode>;

    /// Opens a folder for reading or appending.
    async fn open(&mut self, folder: &FolderNode, mode: OpenMode) -> Result<()>;

    /// Reads every message of an opened folder, in store order.
    ///
    /// Messages the store lists but cannot deliver are reported in
    /// [`FolderMessages::unreadable`] instead of failing the whole folder.
    async fn messages(&mut self, folder: &FolderNode) -> Result<FolderMessages>;

    /// Appends messages to a folder, in order.
    ///
    /// A failure may happen after some of the messages were stored.
    async fn append(&mut self, folder: &FolderNode, messages: &[Message]) -> Result<()>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Contents of a folder as read by [`MailStore::messages`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMessages {
    /// Messages read completely, in store order.
    pub messages: Vec<Message>,
    /// One reason per message that could not be read.
    pub unreadable: Vec<String>,
}

impl FolderMessages {
    /// Number of messages the store listed, readable or not.
    pub fn listed(&self) -> usize {
        self.messages.len() + self.unreadable.len()
    }
}

impl From<Vec<Message>> for FolderMessages {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            messages,
            unreadable: Vec::new(),
        }
    }
}

/// Opens [`MailStore`] connections.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Connects and authenticates to the account named by `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedProtocol`] if the URL's protocol is not
    /// handled by this connector, or a connection/authentication error.
    async fn connect(&self, url: &StoreUrl) -> Result<Box<dyn MailStore>>;
}
