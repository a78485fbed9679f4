//! Progress observation.
//!
//! The copy services report through a [`ProgressObserver`], called
//! synchronously and in traversal order. A slow observer slows the copy down;
//! observers that live on another thread or task should hand events off, as
//! [`ChannelObserver`] does.

use tokio::sync::mpsc;

use crate::domain::{LifecyclePhase, ProgressEvent};

/// Receives progress events from a running copy.
#[cfg_attr(test, mockall::automock)]
pub trait ProgressObserver: Send + Sync {
    /// Called for every event, on the copying task.
    fn notify(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn notify(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn notify(&self, _event: &ProgressEvent) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn notify(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Folder { full_name } => {
                tracing::info!(folder = %full_name, "copying folder");
            }
            ProgressEvent::Lifecycle {
                phase: LifecyclePhase::Start,
            } => tracing::info!("copy started"),
            ProgressEvent::Lifecycle {
                phase: LifecyclePhase::End,
            } => tracing::info!("copy finished"),
        }
    }
}

/// Forwards events into an unbounded channel.
///
/// Sending never waits for the receiver, so the copy is never held up by the
/// consumer. Events sent after the receiver was dropped are discarded.
///
/// # Example
///
/// ```ignore
/// let (observer, mut events) = ChannelObserver::new();
/// let handle = CopySession::new(connector, Arc::new(observer)).spawn(source, target);
///
/// while let Some(event) = events.recv().await {
///     if let ProgressEvent::Folder { full_name } = &event {
///         println!("Copying folder: {full_name}");
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn notify(&self, event: &ProgressEvent) {
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!("progress receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |event: &ProgressEvent| seen.lock().unwrap().push(event.clone());

        observer.notify(&ProgressEvent::folder("INBOX"));
        observer.notify(&ProgressEvent::end());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ProgressEvent::folder("INBOX"), ProgressEvent::end()]
        );
    }

    #[tokio::test]
    async fn channel_observer_forwards_in_order() {
        let (observer, mut events) = ChannelObserver::new();

        observer.notify(&ProgressEvent::start());
        observer.notify(&ProgressEvent::folder("INBOX"));
        drop(observer);

        assert_eq!(events.recv().await, Some(ProgressEvent::start()));
        assert_eq!(events.recv().await, Some(ProgressEvent::folder("INBOX")));
        assert_eq!(events.recv().await, None);
    }

    #[test]
    fn channel_observer_survives_dropped_receiver() {
        let (observer, events) = ChannelObserver::new();
        drop(events);
        observer.notify(&ProgressEvent::end());
    }

    #[test]
    fn mock_observer_receives_event() {
        let mut observer = MockProgressObserver::new();
        observer
            .expect_notify()
            .withf(|event| event.folder_name() == Some("Sent"))
            .times(1)
            .return_const(());

        observer.notify(&ProgressEvent::folder("Sent"));
    }
}
