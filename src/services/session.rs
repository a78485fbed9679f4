//! Copy session orchestration.
//!
//! A [`CopySession`] owns one end-to-end run: it connects to both stores,
//! replicates the source tree into the target, and releases both connections
//! whatever happened in between. Only connection failures are returned as
//! errors; everything else is absorbed into the [`CopyReport`].
//!
//! Sessions run either inline with [`CopySession::run`] or as a background
//! task with [`CopySession::spawn`], which returns a [`CopyHandle`] that can
//! cancel the run cooperatively.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::progress::ProgressObserver;
use super::replicator::FolderReplicator;
use super::report::{CopyReport, FailureStage, FolderFailure};
use crate::domain::{ProgressEvent, StoreUrl};
use crate::providers::store::{MailStore, StoreConnector, StoreError};

/// Which side of the copy a store is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRole {
    Source,
    Target,
}

impl std::fmt::Display for StoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Errors that end a copy session.
#[derive(Debug, Error)]
pub enum CopyError {
    /// A store could not be connected to; no folder was touched.
    #[error("cannot connect to {role} store: {source}")]
    Connection {
        role: StoreRole,
        #[source]
        source: StoreError,
    },

    /// The background task ended without producing a result.
    #[error("copy task failed: {0}")]
    Task(String),
}

impl CopyError {
    /// The store that failed, for connection errors.
    pub fn role(&self) -> Option<StoreRole> {
        match self {
            Self::Connection { role, .. } => Some(*role),
            Self::Task(_) => None,
        }
    }
}

/// One copy of a source account into a target account.
pub struct CopySession {
    connector: Arc<dyn StoreConnector>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    span: tracing::Span,
}

impl CopySession {
    /// Creates a session that connects through `connector` and reports to
    /// `observer`.
    pub fn new(connector: Arc<dyn StoreConnector>, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            connector,
            observer,
            cancel: CancellationToken::new(),
            span: tracing::info_span!("copy"),
        }
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Records everything the session logs inside `span`.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Token that cancels this session.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Copies everything below the source root into the target root.
    ///
    /// The END lifecycle event is emitted exactly once before this returns,
    /// on success, cancellation and connection failure alike.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError::Connection`] if either store cannot be connected
    /// to. A failing source means the target is never contacted.
    pub async fn run(&self, source: &StoreUrl, target: &StoreUrl) -> Result<CopyReport, CopyError> {
        let result = self
            .copy(source, target)
            .instrument(self.span.clone())
            .await;
        self.observer.notify(&ProgressEvent::end());
        result
    }

    /// Runs the session as a tokio task.
    pub fn spawn(self, source: StoreUrl, target: StoreUrl) -> CopyHandle {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.run(&source, &target).await });
        CopyHandle { cancel, task }
    }

    async fn copy(&self, source: &StoreUrl, target: &StoreUrl) -> Result<CopyReport, CopyError> {
        tracing::info!(source = %source, target = %target, "starting copy");

        let mut source_store = self.connect(StoreRole::Source, source).await?;
        let mut target_store = match self.connect(StoreRole::Target, target).await {
            Ok(store) => store,
            Err(e) => {
                close_store(StoreRole::Source, source_store.as_mut()).await;
                return Err(e);
            }
        };

        self.observer.notify(&ProgressEvent::start());

        let source_root = source_store.root();
        let target_root = target_store.root();
        let mut report = FolderReplicator::new(
            source_store.as_mut(),
            target_store.as_mut(),
            self.observer.as_ref(),
        )
        .with_cancellation(self.cancel.clone())
        .replicate(&source_root, &target_root)
        .await;

        for failure in [
            close_store(StoreRole::Source, source_store.as_mut()).await,
            close_store(StoreRole::Target, target_store.as_mut()).await,
        ]
        .into_iter()
        .flatten()
        {
            report.failures.push(failure);
        }

        tracing::info!(
            folders = report.folders_visited,
            created = report.folders_created,
            copied = report.messages_copied,
            failed = report.messages_failed,
            failures = report.failures.len(),
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "copy finished"
        );
        Ok(report)
    }

    async fn connect(&self, role: StoreRole, url: &StoreUrl) -> Result<Box<dyn MailStore>, CopyError> {
        match self.connector.connect(url).await {
            Ok(store) => {
                tracing::debug!(%role, url = %url, "connected");
                Ok(store)
            }
            Err(source) => {
                tracing::error!(%role, url = %url, error = %source, "connection failed");
                Err(CopyError::Connection { role, source })
            }
        }
    }
}

/// Closes one store, turning a failure into a report entry.
async fn close_store(role: StoreRole, store: &mut dyn MailStore) -> Option<FolderFailure> {
    match store.close().await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(%role, error = %e, "failed to close store");
            Some(FolderFailure::new(role.to_string(), FailureStage::Close, e.to_string()))
        }
    }
}

/// Handle to a session running as a background task.
#[derive(Debug)]
pub struct CopyHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<CopyReport, CopyError>>,
}

impl CopyHandle {
    /// Asks the session to stop at the next folder or message boundary.
    /// Both connections are still closed and END is still emitted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to end.
    ///
    /// # Errors
    ///
    /// Returns the session's [`CopyError`], or [`CopyError::Task`] if the
    /// task panicked or was aborted.
    pub async fn join(self) -> Result<CopyReport, CopyError> {
        self.task
            .await
            .map_err(|e| CopyError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FolderKind, LifecyclePhase, Message};
    use crate::providers::store::{MemoryAccount, MemoryConnector, StoreCall};
    use crate::services::progress::{ChannelObserver, NoopObserver};
    use tokio_test::{assert_err, assert_ok};

    fn url(host: &str) -> StoreUrl {
        StoreUrl::parse(&format!("memory://alice@{host}")).unwrap()
    }

    fn accounts() -> (MemoryAccount, MemoryAccount, Arc<MemoryConnector>) {
        let source = MemoryAccount::new();
        let target = MemoryAccount::new();
        let connector = MemoryConnector::new()
            .with_account("source", source.clone())
            .with_account("target", target.clone());
        (source, target, Arc::new(connector))
    }

    fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[tokio::test]
    async fn run_copies_and_closes_both_stores() {
        let (source, target, connector) = accounts();
        source
            .add_messages("INBOX", (0..3).map(|i| Message::new(format!("m{i}"))))
            .add_folder("INBOX/Archive", FolderKind::MIXED);
        let (observer, mut events) = ChannelObserver::new();

        let session = CopySession::new(connector, Arc::new(observer));
        let report = assert_ok!(session.run(&url("source"), &url("target")).await);

        assert!(report.is_success());
        assert_eq!(target.messages("INBOX").len(), 3);
        assert_eq!(target.folder_names(), vec!["INBOX", "INBOX/Archive"]);
        assert_eq!(source.close_count(), 1);
        assert_eq!(target.close_count(), 1);
        assert_eq!(
            drain(&mut events),
            vec![
                ProgressEvent::start(),
                ProgressEvent::folder("INBOX"),
                ProgressEvent::folder("INBOX/Archive"),
                ProgressEvent::end(),
            ]
        );
    }

    #[tokio::test]
    async fn source_failure_never_contacts_target() {
        let target = MemoryAccount::new();
        let connector = Arc::new(MemoryConnector::new().with_account("target", target.clone()));
        let (observer, mut events) = ChannelObserver::new();

        let session = CopySession::new(connector.clone(), Arc::new(observer));
        let err = assert_err!(session.run(&url("missing"), &url("target")).await);

        assert_eq!(err.role(), Some(StoreRole::Source));
        assert_eq!(connector.attempts(), vec!["missing"]);
        assert!(target.calls().is_empty());
        assert_eq!(drain(&mut events), vec![ProgressEvent::end()]);
    }

    #[tokio::test]
    async fn target_failure_closes_source() {
        let source = MemoryAccount::new();
        source.add_folder("INBOX", FolderKind::MIXED);
        let connector = Arc::new(MemoryConnector::new().with_account("source", source.clone()));
        let (observer, mut events) = ChannelObserver::new();

        let session = CopySession::new(connector, Arc::new(observer));
        let err = assert_err!(session.run(&url("source"), &url("missing")).await);

        assert!(matches!(
            err,
            CopyError::Connection {
                role: StoreRole::Target,
                source: StoreError::Connection(_)
            }
        ));
        assert_eq!(source.calls(), vec![StoreCall::Close]);
        assert_eq!(drain(&mut events), vec![ProgressEvent::end()]);
    }

    #[tokio::test]
    async fn close_failure_does_not_prevent_closing_the_other_store() {
        let (source, target, connector) = accounts();
        source.fail_close();

        let session = CopySession::new(connector, Arc::new(NoopObserver));
        let report = assert_ok!(session.run(&url("source"), &url("target")).await);

        assert_eq!(source.close_count(), 1);
        assert_eq!(target.close_count(), 1);
        assert_eq!(
            report.failures,
            vec![FolderFailure::new(
                "source",
                FailureStage::Close,
                "connection error: close failed"
            )]
        );
    }

    #[tokio::test]
    async fn cancelled_session_still_closes_and_ends() {
        let (source, target, connector) = accounts();
        source.add_folder("INBOX", FolderKind::MIXED);
        let (observer, mut events) = ChannelObserver::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let session = CopySession::new(connector, Arc::new(observer)).with_cancellation(cancel);
        let report = assert_ok!(session.run(&url("source"), &url("target")).await);

        assert!(report.cancelled);
        assert!(target.folder_names().is_empty());
        assert_eq!(source.close_count(), 1);
        assert_eq!(target.close_count(), 1);
        assert_eq!(
            drain(&mut events),
            vec![ProgressEvent::start(), ProgressEvent::end()]
        );
    }

    #[tokio::test]
    async fn spawned_session_can_be_joined() {
        let (source, target, connector) = accounts();
        source.add_messages("INBOX", [Message::new("hello")]);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let observer = move |event: &ProgressEvent| recorded.lock().unwrap().push(event.clone());

        let handle = CopySession::new(connector, Arc::new(observer))
            .spawn(url("source"), url("target"));
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        let report = assert_ok!(handle.join().await);

        assert_eq!(report.messages_copied, 1);
        assert_eq!(target.messages("INBOX").len(), 1);
        let ends = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Lifecycle { phase: LifecyclePhase::End }))
            .count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn connection_error_display() {
        let err = CopyError::Connection {
            role: StoreRole::Target,
            source: StoreError::Authentication("bad password".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "cannot connect to target store: authentication failed: bad password"
        );
    }
}
