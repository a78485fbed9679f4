//! Progress events reported while a copy runs.

use serde::{Deserialize, Serialize};

/// Start/end of a copy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Both stores are connected and replication is about to begin.
    Start,
    /// The run is over, whatever its outcome.
    End,
}

/// Event delivered to a [`ProgressObserver`](crate::services::ProgressObserver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The named source folder is now being copied.
    Folder {
        /// Full hierarchical name of the folder.
        full_name: String,
    },
    /// Lifecycle signal for the whole run.
    Lifecycle {
        /// Which lifecycle point was reached.
        phase: LifecyclePhase,
    },
}

impl ProgressEvent {
    /// Creates a folder event.
    pub fn folder(full_name: impl Into<String>) -> Self {
        Self::Folder {
            full_name: full_name.into(),
        }
    }

    /// The START lifecycle event.
    pub const fn start() -> Self {
        Self::Lifecycle {
            phase: LifecyclePhase::Start,
        }
    }

    /// The END lifecycle event.
    pub const fn end() -> Self {
        Self::Lifecycle {
            phase: LifecyclePhase::End,
        }
    }

    /// Returns the folder name for folder events.
    pub fn folder_name(&self) -> Option<&str> {
        match self {
            Self::Folder { full_name } => Some(full_name),
            Self::Lifecycle { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_event_serialization() {
        let event = ProgressEvent::folder("INBOX/Work");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"folder","full_name":"INBOX/Work"}"#);

        let deserialized: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.folder_name(), Some("INBOX/Work"));
    }

    #[test]
    fn lifecycle_event_serialization() {
        let json = serde_json::to_string(&ProgressEvent::end()).unwrap();
        assert_eq!(json, r#"{"type":"lifecycle","phase":"end"}"#);
        assert_eq!(ProgressEvent::start().folder_name(), None);
    }
}
