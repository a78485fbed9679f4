//! Message domain type.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A message read from a source folder.
///
/// The content is the raw RFC 5322 message. Messages are never modified by a
/// copy; they are only appended to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw message bytes.
    pub content: Vec<u8>,
    /// Store flags in protocol form, e.g. `\Seen`.
    pub flags: Vec<String>,
    /// When the store received the message, if known.
    pub internal_date: Option<DateTime<FixedOffset>>,
}

impl Message {
    /// Creates a message without flags or internal date.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            flags: Vec::new(),
            internal_date: None,
        }
    }

    /// Adds store flags.
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Sets the internal date.
    pub fn with_internal_date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.internal_date = Some(date);
        self
    }

    /// Size of the raw message in bytes.
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_builder() {
        let date = DateTime::parse_from_rfc3339("2024-03-01T10:00:00+01:00").unwrap();
        let message = Message::new("Subject: hi\r\n\r\nbody")
            .with_flags(["\\Seen", "\\Flagged"])
            .with_internal_date(date);

        assert_eq!(message.flags, vec!["\\Seen", "\\Flagged"]);
        assert_eq!(message.internal_date, Some(date));
        assert_eq!(message.size(), 19);
    }
}
