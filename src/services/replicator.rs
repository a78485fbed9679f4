//! Folder tree replication.
//!
//! [`FolderReplicator`] walks the source tree depth-first in pre-order and
//! mirrors it under the target root. Every target folder exists before
//! messages are appended to it and before its children are processed.
//!
//! Failures below the connection level are absorbed where they happen:
//!
//! - A folder that cannot be opened, fetched, listed or created is skipped
//!   together with its subtree; siblings continue.
//! - A failed bulk append falls back to appending message by message. The
//!   fallback assumes nothing of the batch was stored, so messages the server
//!   accepted before the failure are stored twice.
//! - A single message that cannot be read or stored is recorded and the next
//!   one is attempted.
//!
//! Everything absorbed ends up in the returned [`CopyReport`].

use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressObserver;
use super::report::{CopyReport, FailureStage, FolderFailure};
use crate::domain::{FolderNode, Message, OpenMode, ProgressEvent};
use crate::providers::store::{FolderMessages, MailStore, StoreError};

/// Copies a folder tree from one store connection into another.
pub struct FolderReplicator<'a> {
    source: &'a mut dyn MailStore,
    target: &'a mut dyn MailStore,
    observer: &'a dyn ProgressObserver,
    cancel: CancellationToken,
    report: CopyReport,
}

impl<'a> FolderReplicator<'a> {
    pub fn new(
        source: &'a mut dyn MailStore,
        target: &'a mut dyn MailStore,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            source,
            target,
            observer,
            cancel: CancellationToken::new(),
            report: CopyReport::default(),
        }
    }

    /// Stops the traversal at the next folder, child or fallback append once
    /// `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Mirrors the tree below `source_root` under `target_root`.
    ///
    /// The roots themselves are containers: their messages are never read and
    /// nothing is appended to them.
    pub async fn replicate(
        mut self,
        source_root: &FolderNode,
        target_root: &FolderNode,
    ) -> CopyReport {
        let start = Instant::now();

        self.replicate_folder(source_root.clone(), target_root.clone(), true)
            .await;

        self.report.cancelled = self.cancel.is_cancelled();
        self.report.duration_ms = start.elapsed().as_millis() as u64;
        self.report
    }

    fn replicate_folder(
        &mut self,
        source: FolderNode,
        target: FolderNode,
        is_root: bool,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                return;
            }

            if !is_root {
                self.report.folders_visited += 1;
                self.observer.notify(&ProgressEvent::folder(source.full_name()));

                if !self.copy_messages(&source, &target).await || self.cancel.is_cancelled() {
                    return;
                }
            }

            let children = match self.source.list(&source).await {
                Ok(children) => children,
                Err(e) => {
                    self.fail(source.full_name(), FailureStage::ListChildren, &e);
                    return;
                }
            };

            for child in children {
                if self.cancel.is_cancelled() {
                    tracing::debug!(folder = %source, "copy cancelled before next child");
                    return;
                }
                if let Some(target_child) = self.target_child(&child, &target).await {
                    self.replicate_folder(child, target_child, false).await;
                }
            }
        })
    }

    /// Copies the messages of one folder. Returns false if the folder's
    /// subtree has to be skipped.
    async fn copy_messages(&mut self, source: &FolderNode, target: &FolderNode) -> bool {
        if !source.kind().holds_messages {
            tracing::debug!(folder = %source, "folder holds no messages");
            return true;
        }

        if let Err(e) = self.source.open(source, OpenMode::ReadOnly).await {
            self.fail(source.full_name(), FailureStage::Open, &e);
            return false;
        }
        let FolderMessages {
            messages,
            unreadable,
        } = match self.source.messages(source).await {
            Ok(contents) => contents,
            Err(e) => {
                self.fail(source.full_name(), FailureStage::Fetch, &e);
                return false;
            }
        };
        for reason in unreadable {
            tracing::error!(folder = %source, reason = %reason, "failed to read message");
            self.report.messages_failed += 1;
            self.report
                .failures
                .push(FolderFailure::new(source.full_name(), FailureStage::Fetch, reason));
        }
        if messages.is_empty() {
            return true;
        }

        if let Err(e) = self.target.open(target, OpenMode::ReadWrite).await {
            self.fail(target.full_name(), FailureStage::Open, &e);
            return false;
        }

        tracing::debug!(folder = %target, count = messages.len(), "appending messages");
        match self.target.append(target, &messages).await {
            Ok(()) => self.report.messages_copied += messages.len(),
            Err(e) => {
                tracing::warn!(
                    folder = %target,
                    count = messages.len(),
                    error = %e,
                    "bulk append failed, appending one by one; messages stored before the failure will be duplicated"
                );
                self.report.bulk_fallbacks += 1;
                self.append_one_by_one(target, &messages).await;
            }
        }
        true
    }

    async fn append_one_by_one(&mut self, target: &FolderNode, messages: &[Message]) {
        for (index, message) in messages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::debug!(
                    folder = %target,
                    remaining = messages.len() - index,
                    "copy cancelled during fallback"
                );
                return;
            }

            match self.target.append(target, std::slice::from_ref(message)).await {
                Ok(()) => self.report.messages_copied += 1,
                Err(e) => {
                    tracing::error!(
                        folder = %target,
                        position = index + 1,
                        error = %e,
                        "failed to copy message"
                    );
                    self.report.messages_failed += 1;
                    self.report.failures.push(FolderFailure::new(
                        target.full_name(),
                        FailureStage::Append,
                        format!("message {}: {e}", index + 1),
                    ));
                }
            }
        }
    }

    /// Resolves the target folder for `source_child`, creating it with the
    /// source's type flags when missing.
    async fn target_child(
        &mut self,
        source_child: &FolderNode,
        target_parent: &FolderNode,
    ) -> Option<FolderNode> {
        let node = match self.target.child(target_parent, source_child.name()).await {
            Ok(node) => node,
            Err(e) => {
                self.fail(source_child.full_name(), FailureStage::Create, &e);
                return None;
            }
        };
        if node.exists() {
            return Some(node);
        }

        match self.target.create(&node, source_child.kind()).await {
            Ok(created) => {
                tracing::debug!(folder = %created, "created target folder");
                self.report.folders_created += 1;
                Some(created)
            }
            Err(e) => {
                self.fail(node.full_name(), FailureStage::Create, &e);
                None
            }
        }
    }

    fn fail(&mut self, folder: &str, stage: FailureStage, error: &StoreError) {
        tracing::error!(folder, %stage, error = %error, "skipping folder");
        self.report
            .failures
            .push(FolderFailure::new(folder, stage, error.to_string()));
    }
}
