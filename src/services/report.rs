//! Outcome of a copy run.

use serde::{Deserialize, Serialize};

/// The step of the copy a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Opening a source or target folder.
    Open,
    /// Reading the messages of a source folder.
    Fetch,
    /// Listing the children of a source folder.
    ListChildren,
    /// Resolving or creating a target folder.
    Create,
    /// Storing a single message after a failed bulk append.
    Append,
    /// Releasing a store connection.
    Close,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            Self::Open => "open",
            Self::Fetch => "fetch",
            Self::ListChildren => "list children",
            Self::Create => "create",
            Self::Append => "append",
            Self::Close => "close",
        };
        f.write_str(stage)
    }
}

/// A failure that was absorbed during the copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderFailure {
    /// Full name of the affected folder, or the store role for [`FailureStage::Close`].
    pub folder: String,
    /// Step that failed.
    pub stage: FailureStage,
    /// Error message from the store.
    pub reason: String,
}

impl FolderFailure {
    pub fn new(folder: impl Into<String>, stage: FailureStage, reason: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            stage,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FolderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed for {}: {}", self.stage, self.folder, self.reason)
    }
}

/// Summary of a completed copy run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyReport {
    /// Source folders announced and processed, root excluded.
    pub folders_visited: usize,
    /// Target folders created.
    pub folders_created: usize,
    /// Messages stored in the target.
    pub messages_copied: usize,
    /// Messages that could not be stored one by one.
    pub messages_failed: usize,
    /// Folders whose bulk append failed and were retried message by message.
    pub bulk_fallbacks: usize,
    /// Every absorbed failure, in the order it happened.
    pub failures: Vec<FolderFailure>,
    /// Whether the run stopped early because it was cancelled.
    pub cancelled: bool,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,
}

impl CopyReport {
    /// Returns true if the whole tree was copied without any failure.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Folders that had at least one failure, without duplicates.
    pub fn failed_folders(&self) -> Vec<&str> {
        let mut folders: Vec<&str> = Vec::new();
        for failure in &self.failures {
            if !folders.contains(&failure.folder.as_str()) {
                folders.push(&failure.folder);
            }
        }
        folders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_success() {
        assert!(CopyReport::default().is_success());
    }

    #[test]
    fn cancelled_report_is_not_success() {
        let report = CopyReport {
            cancelled: true,
            ..Default::default()
        };
        assert!(!report.is_success());
    }

    #[test]
    fn failed_folders_are_deduplicated() {
        let report = CopyReport {
            failures: vec![
                FolderFailure::new("INBOX", FailureStage::Append, "message 1: rejected"),
                FolderFailure::new("Sent", FailureStage::Open, "gone"),
                FolderFailure::new("INBOX", FailureStage::Append, "message 3: rejected"),
            ],
            ..Default::default()
        };
        assert!(!report.is_success());
        assert_eq!(report.failed_folders(), vec!["INBOX", "Sent"]);
    }

    #[test]
    fn failure_display() {
        let failure = FolderFailure::new("INBOX/Work", FailureStage::ListChildren, "timeout");
        assert_eq!(failure.to_string(), "list children failed for INBOX/Work: timeout");
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&FailureStage::ListChildren).unwrap();
        assert_eq!(json, r#""list_children""#);
    }
}
