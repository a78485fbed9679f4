//! In-memory mail store.
//!
//! [`MemoryAccount`] holds a folder tree and its messages in memory and hands
//! out [`MemoryStore`] connections to it. Accounts are shared handles, so the
//! folders a copy produced can be inspected after the session released its
//! connections. Every store call is recorded and individual operations can be
//! made to fail, which makes this store the test double for the copy services.
//!
//! URLs use the `memory` protocol and select an account by host:
//! `memory://user@source`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{FolderMessages, MailStore, Result, StoreConnector, StoreError};
use crate::domain::{FolderKind, FolderNode, Message, OpenMode, StoreUrl};

/// Protocol name served by [`MemoryConnector`].
pub const MEMORY_PROTOCOL: &str = "memory";

/// A store operation as recorded by [`MemoryAccount::calls`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// Children of the folder were listed.
    List(String),
    /// The folder was created.
    Create(String),
    /// The folder was opened.
    Open(String, OpenMode),
    /// Messages of the folder were read.
    Messages(String),
    /// Messages were appended to the folder.
    Append {
        /// Target folder.
        folder: String,
        /// Number of messages in the call.
        count: usize,
    },
    /// The connection was closed.
    Close,
}

#[derive(Debug, Clone)]
struct MemoryFolder {
    full_name: String,
    kind: FolderKind,
    messages: Vec<Message>,
}

#[derive(Debug, Default)]
struct AccountState {
    folders: Vec<MemoryFolder>,
    calls: Vec<StoreCall>,
    fail_open: HashSet<String>,
    fail_list: HashSet<String>,
    fail_create: HashSet<String>,
    bulk_failures: HashMap<String, usize>,
    rejected: HashSet<Vec<u8>>,
    unreadable: HashSet<Vec<u8>>,
    cancel_after: Option<(usize, CancellationToken)>,
    single_appends: usize,
    fail_close: bool,
    closes: usize,
}

impl AccountState {
    fn folder(&self, full_name: &str) -> Option<&MemoryFolder> {
        self.folders.iter().find(|f| f.full_name == full_name)
    }

    fn folder_mut(&mut self, full_name: &str) -> Option<&mut MemoryFolder> {
        self.folders.iter_mut().find(|f| f.full_name == full_name)
    }
}

/// A mail account kept in memory.
#[derive(Debug, Clone)]
pub struct MemoryAccount {
    state: Arc<Mutex<AccountState>>,
    delimiter: char,
}

impl Default for MemoryAccount {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccount {
    /// Creates an empty account using `/` as hierarchy delimiter.
    pub fn new() -> Self {
        Self::with_delimiter('/')
    }

    /// Creates an empty account with a custom hierarchy delimiter.
    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            state: Arc::new(Mutex::new(AccountState::default())),
            delimiter,
        }
    }

    fn state(&self) -> MutexGuard<'_, AccountState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parent_of<'a>(&self, full_name: &'a str) -> &'a str {
        full_name
            .rsplit_once(self.delimiter)
            .map_or("", |(parent, _)| parent)
    }

    fn name_of<'a>(&self, full_name: &'a str) -> &'a str {
        full_name
            .rsplit_once(self.delimiter)
            .map_or(full_name, |(_, name)| name)
    }

    fn node(&self, folder: &MemoryFolder) -> FolderNode {
        FolderNode::new(
            folder.full_name.clone(),
            self.name_of(&folder.full_name),
            folder.kind,
            true,
        )
    }

    /// Adds a folder. Adding an existing folder changes nothing.
    pub fn add_folder(&self, full_name: &str, kind: FolderKind) -> &Self {
        let mut state = self.state();
        if state.folder(full_name).is_none() {
            state.folders.push(MemoryFolder {
                full_name: full_name.to_string(),
                kind,
                messages: Vec::new(),
            });
        }
        self
    }

    /// Adds messages to a folder, creating the folder if needed.
    pub fn add_messages<I>(&self, full_name: &str, messages: I) -> &Self
    where
        I: IntoIterator<Item = Message>,
    {
        self.add_folder(full_name, FolderKind::MIXED);
        let mut state = self.state();
        if let Some(folder) = state.folder_mut(full_name) {
            folder.messages.extend(messages);
        }
        self
    }

    /// Full names of all folders, in creation order.
    pub fn folder_names(&self) -> Vec<String> {
        self.state()
            .folders
            .iter()
            .map(|f| f.full_name.clone())
            .collect()
    }

    /// Type flags of a folder, if it exists.
    pub fn kind(&self, full_name: &str) -> Option<FolderKind> {
        self.state().folder(full_name).map(|f| f.kind)
    }

    /// Messages stored in a folder; empty if the folder does not exist.
    pub fn messages(&self, full_name: &str) -> Vec<Message> {
        self.state()
            .folder(full_name)
            .map(|f| f.messages.clone())
            .unwrap_or_default()
    }

    /// Every store call made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// How many times a connection to this account was closed.
    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    /// Makes opening the folder fail.
    pub fn fail_open(&self, full_name: &str) -> &Self {
        self.state().fail_open.insert(full_name.to_string());
        self
    }

    /// Makes listing the children of the folder fail.
    pub fn fail_list(&self, full_name: &str) -> &Self {
        self.state().fail_list.insert(full_name.to_string());
        self
    }

    /// Makes creating the folder fail.
    pub fn fail_create(&self, full_name: &str) -> &Self {
        self.state().fail_create.insert(full_name.to_string());
        self
    }

    /// Makes appends of more than one message to the folder fail once
    /// `stored_before_failure` messages of the batch have been stored.
    pub fn fail_bulk_append(&self, full_name: &str, stored_before_failure: usize) -> &Self {
        self.state()
            .bulk_failures
            .insert(full_name.to_string(), stored_before_failure);
        self
    }

    /// Makes every append of a message with this content fail.
    pub fn reject_message(&self, content: impl Into<Vec<u8>>) -> &Self {
        self.state().rejected.insert(content.into());
        self
    }

    /// Makes reading a message with this content fail. The message is
    /// reported as unreadable and left out of its folder's contents.
    pub fn unreadable_message(&self, content: impl Into<Vec<u8>>) -> &Self {
        self.state().unreadable.insert(content.into());
        self
    }

    /// Cancels `token` once `count` single-message appends were stored.
    pub fn cancel_after_single_appends(&self, count: usize, token: CancellationToken) -> &Self {
        self.state().cancel_after = Some((count, token));
        self
    }

    /// Makes closing connections fail. The connection is released anyway.
    pub fn fail_close(&self) -> &Self {
        self.state().fail_close = true;
        self
    }

    /// Opens a connection to this account.
    pub fn connect(&self) -> MemoryStore {
        MemoryStore {
            account: self.clone(),
            closed: false,
        }
    }
}

/// A connection to a [`MemoryAccount`].
#[derive(Debug)]
pub struct MemoryStore {
    account: MemoryAccount,
    closed: bool,
}

impl MemoryStore {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::Connection("connection is closed".to_string()));
        }
        Ok(())
    }

    fn record(&self, call: StoreCall) {
        self.account.state().calls.push(call);
    }
}

#[async_trait]
impl MailStore for MemoryStore {
    fn root(&self) -> FolderNode {
        FolderNode::root()
    }

    async fn list(&mut self, folder: &FolderNode) -> Result<Vec<FolderNode>> {
        self.ensure_open()?;
        self.record(StoreCall::List(folder.full_name().to_string()));

        let state = self.account.state();
        if state.fail_list.contains(folder.full_name()) {
            return Err(StoreError::Folder(format!("cannot list {folder}")));
        }
        if !folder.is_root() && state.folder(folder.full_name()).is_none() {
            return Err(StoreError::NotFound(folder.full_name().to_string()));
        }

        Ok(state
            .folders
            .iter()
            .filter(|f| self.account.parent_of(&f.full_name) == folder.full_name())
            .map(|f| self.account.node(f))
            .collect())
    }

    async fn child(&mut self, parent: &FolderNode, name: &str) -> Result<FolderNode> {
        self.ensure_open()?;

        let full_name = if parent.is_root() {
            name.to_string()
        } else {
            format!("{}{}{}", parent.full_name(), self.account.delimiter, name)
        };

        let state = self.account.state();
        Ok(match state.folder(&full_name) {
            Some(folder) => self.account.node(folder),
            None => FolderNode::new(full_name, name, FolderKind::default(), false),
        })
    }

    async fn create(&mut self, folder: &FolderNode, kind: FolderKind) -> Result<FolderNode> {
        self.ensure_open()?;
        self.record(StoreCall::Create(folder.full_name().to_string()));

        let mut state = self.account.state();
        if folder.is_root() {
            return Err(StoreError::Folder("cannot create the root folder".to_string()));
        }
        if state.fail_create.contains(folder.full_name()) {
            return Err(StoreError::Folder(format!("cannot create {folder}")));
        }
        if state.folder(folder.full_name()).is_some() {
            return Err(StoreError::Folder(format!("{folder} already exists")));
        }

        state.folders.push(MemoryFolder {
            full_name: folder.full_name().to_string(),
            kind,
            messages: Vec::new(),
        });
        Ok(folder.clone().created(kind))
    }

    async fn open(&mut self, folder: &FolderNode, mode: OpenMode) -> Result<()> {
        self.ensure_open()?;
        self.record(StoreCall::Open(folder.full_name().to_string(), mode));

        let state = self.account.state();
        if state.fail_open.contains(folder.full_name()) {
            return Err(StoreError::Folder(format!("cannot open {folder}")));
        }
        match state.folder(folder.full_name()) {
            None => Err(StoreError::NotFound(folder.full_name().to_string())),
            Some(f) if !f.kind.holds_messages => {
                Err(StoreError::Folder(format!("{folder} cannot hold messages")))
            }
            Some(_) => Ok(()),
        }
    }

    async fn messages(&mut self, folder: &FolderNode) -> Result<FolderMessages> {
        self.ensure_open()?;
        self.record(StoreCall::Messages(folder.full_name().to_string()));

        let state = self.account.state();
        let stored = state
            .folder(folder.full_name())
            .ok_or_else(|| StoreError::NotFound(folder.full_name().to_string()))?;

        let mut contents = FolderMessages::default();
        for (index, message) in stored.messages.iter().enumerate() {
            if state.unreadable.contains(&message.content) {
                contents
                    .unreadable
                    .push(format!("message {} cannot be read", index + 1));
            } else {
                contents.messages.push(message.clone());
            }
        }
        Ok(contents)
    }

    async fn append(&mut self, folder: &FolderNode, messages: &[Message]) -> Result<()> {
        self.ensure_open()?;
        self.record(StoreCall::Append {
            folder: folder.full_name().to_string(),
            count: messages.len(),
        });

        let mut guard = self.account.state();
        let state = &mut *guard;
        let fail_after = if messages.len() > 1 {
            state.bulk_failures.get(folder.full_name()).copied()
        } else {
            None
        };

        let target = state
            .folders
            .iter_mut()
            .find(|f| f.full_name == folder.full_name())
            .ok_or_else(|| StoreError::NotFound(folder.full_name().to_string()))?;
        if !target.kind.holds_messages {
            return Err(StoreError::Append(format!(
                "{folder} cannot hold messages"
            )));
        }

        for (index, message) in messages.iter().enumerate() {
            if fail_after == Some(index) {
                return Err(StoreError::Append(format!(
                    "{folder}: interrupted after {index} messages"
                )));
            }
            if state.rejected.contains(&message.content) {
                return Err(StoreError::Append(format!(
                    "{folder}: message {index} rejected"
                )));
            }
            target.messages.push(message.clone());
        }

        if messages.len() == 1 {
            state.single_appends += 1;
            if let Some((count, token)) = &state.cancel_after {
                if state.single_appends == *count {
                    token.cancel();
                }
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.record(StoreCall::Close);
        self.closed = true;

        let mut state = self.account.state();
        state.closes += 1;
        if state.fail_close {
            return Err(StoreError::Connection("close failed".to_string()));
        }
        Ok(())
    }
}

/// Connects to [`MemoryAccount`]s registered by host name.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    accounts: HashMap<String, MemoryAccount>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MemoryConnector {
    /// Creates a connector without accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account under a host name.
    pub fn with_account(mut self, host: impl Into<String>, account: MemoryAccount) -> Self {
        self.accounts.insert(host.into(), account);
        self
    }

    /// Hosts of every connection attempt, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, url: &StoreUrl) -> Result<Box<dyn MailStore>> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.host().to_string());

        if url.protocol() != MEMORY_PROTOCOL {
            return Err(StoreError::UnsupportedProtocol(url.protocol().to_string()));
        }

        let account = self
            .accounts
            .get(url.host())
            .ok_or_else(|| StoreError::Connection(format!("no account at {}", url.host())))?;

        tracing::debug!(url = %url, "opened in-memory store");
        Ok(Box::new(account.connect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> MemoryAccount {
        let account = MemoryAccount::new();
        account
            .add_folder("INBOX", FolderKind::MIXED)
            .add_folder("INBOX/Work", FolderKind::MESSAGES_ONLY)
            .add_folder("Archive", FolderKind::FOLDERS_ONLY);
        account
    }

    #[tokio::test]
    async fn list_returns_immediate_children_in_order() {
        let account = account();
        let mut store = account.connect();

        let root = store.root();
        let names: Vec<_> = store
            .list(&root)
            .await
            .unwrap()
            .iter()
            .map(|f| f.full_name().to_string())
            .collect();
        assert_eq!(names, vec!["INBOX", "Archive"]);

        let inbox = store.child(&root, "INBOX").await.unwrap();
        let children = store.list(&inbox).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name(), "Work");
        assert_eq!(children[0].kind(), FolderKind::MESSAGES_ONLY);
    }

    #[tokio::test]
    async fn child_reports_missing_folder() {
        let account = account();
        let mut store = account.connect();

        let inbox = store.child(&store.root(), "INBOX").await.unwrap();
        let missing = store.child(&inbox, "Personal").await.unwrap();
        assert!(!missing.exists());
        assert_eq!(missing.full_name(), "INBOX/Personal");
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let account = account();
        let mut store = account.connect();

        let root = store.root();
        let node = store.child(&root, "Sent").await.unwrap();
        let created = store.create(&node, FolderKind::MIXED).await.unwrap();
        assert!(created.exists());
        assert!(matches!(
            store.create(&node, FolderKind::MIXED).await,
            Err(StoreError::Folder(_))
        ));
    }

    #[tokio::test]
    async fn bulk_failure_keeps_messages_stored_before_it() {
        let account = account();
        account.fail_bulk_append("INBOX", 2);
        let mut store = account.connect();

        let inbox = store.child(&store.root(), "INBOX").await.unwrap();
        let batch: Vec<_> = (0..4).map(|i| Message::new(format!("m{i}"))).collect();

        assert!(store.append(&inbox, &batch).await.is_err());
        assert_eq!(account.messages("INBOX").len(), 2);

        // single appends are not affected
        store.append(&inbox, &batch[3..]).await.unwrap();
        assert_eq!(account.messages("INBOX").len(), 3);
    }

    #[tokio::test]
    async fn unreadable_messages_are_reported() {
        let account = account();
        account
            .add_messages("INBOX", [Message::new("ok"), Message::new("broken")])
            .unreadable_message("broken");
        let mut store = account.connect();

        let inbox = store.child(&store.root(), "INBOX").await.unwrap();
        let contents = store.messages(&inbox).await.unwrap();
        assert_eq!(contents.messages, vec![Message::new("ok")]);
        assert_eq!(contents.unreadable, vec!["message 2 cannot be read"]);
    }

    #[tokio::test]
    async fn single_appends_fire_cancellation() {
        let account = account();
        let token = CancellationToken::new();
        account.cancel_after_single_appends(2, token.clone());
        let mut store = account.connect();

        let inbox = store.child(&store.root(), "INBOX").await.unwrap();
        let batch = [Message::new("a"), Message::new("b")];
        store.append(&inbox, &batch).await.unwrap();
        store.append(&inbox, &batch[..1]).await.unwrap();
        assert!(!token.is_cancelled());

        store.append(&inbox, &batch[1..]).await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cleared_calls_are_forgotten() {
        let account = account();
        let mut store = account.connect();

        store.list(&store.root()).await.unwrap();
        assert_eq!(account.calls(), vec![StoreCall::List(String::new())]);

        account.clear_calls();
        store.close().await.unwrap();
        assert_eq!(account.calls(), vec![StoreCall::Close]);
    }

    #[tokio::test]
    async fn open_folder_without_messages_fails() {
        let account = account();
        let mut store = account.connect();

        let archive = store.child(&store.root(), "Archive").await.unwrap();
        assert!(store.open(&archive, OpenMode::ReadOnly).await.is_err());
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let account = account();
        let mut store = account.connect();

        store.close().await.unwrap();
        assert_eq!(account.close_count(), 1);
        assert!(matches!(
            store.list(&FolderNode::root()).await,
            Err(StoreError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn connector_selects_account_by_host() {
        let connector = MemoryConnector::new().with_account("source", account());

        let url = StoreUrl::parse("memory://alice@source").unwrap();
        assert!(connector.connect(&url).await.is_ok());

        let unknown = StoreUrl::parse("memory://alice@elsewhere").unwrap();
        assert!(matches!(
            connector.connect(&unknown).await,
            Err(StoreError::Connection(_))
        ));

        let imap = StoreUrl::parse("imap://alice@source").unwrap();
        assert!(matches!(
            connector.connect(&imap).await,
            Err(StoreError::UnsupportedProtocol(_))
        ));

        assert_eq!(connector.attempts(), vec!["source", "elsewhere", "source"]);
    }
}
