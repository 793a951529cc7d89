use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::error::DestinationError;
use crate::event::MonitorEvent;
use crate::severity::{EventType, Severity};

use super::{MonitorDestination, Notification};

/// Destination pushing notifications into a bounded channel.
///
/// Sending never blocks the reporting thread: when the buffer is full the
/// notification is dropped and counted.
#[derive(Debug)]
pub struct ChannelDestination {
    name: String,
    tx: Sender<Notification>,
    dropped: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl ChannelDestination {
    /// Creates the destination and the stream reading from it.
    #[must_use]
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (Self, NotificationStream) {
        let (tx, rx) = bounded(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let destination = Self {
            name: name.into(),
            tx,
            dropped: Arc::clone(&dropped),
            closed: AtomicBool::new(false),
        };
        (destination, NotificationStream { rx, dropped })
    }

    /// Notifications dropped because the buffer was full or the stream gone.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MonitorDestination for ChannelDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "channel"
    }

    fn fire_event(
        &self,
        monitor: &str,
        event_type: EventType,
        severity: Severity,
        event_code: &str,
        event: &MonitorEvent,
    ) -> Result<(), DestinationError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DestinationError::Disconnected {
                destination: self.name.clone(),
            });
        }

        let notification = Notification::new(monitor, event_type, severity, event_code, event);
        match self.tx.try_send(notification) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DestinationError::SendFailed {
                    destination: self.name.clone(),
                    message: "buffer full".to_string(),
                })
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(DestinationError::Disconnected {
                    destination: self.name.clone(),
                })
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Receiving end of a [`ChannelDestination`].
#[derive(Debug, Clone)]
pub struct NotificationStream {
    rx: Receiver<Notification>,
    dropped: Arc<AtomicU64>,
}

impl NotificationStream {
    /// Receive the next notification (blocking).
    ///
    /// # Errors
    ///
    /// Returns `DestinationError::Disconnected` once the destination is gone
    /// and the buffer is drained.
    pub fn recv(&self) -> Result<Notification, DestinationError> {
        self.rx.recv().map_err(|_| DestinationError::Disconnected {
            destination: "notification_stream".to_string(),
        })
    }

    /// Receive the next notification with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `DestinationError::Timeout` when nothing arrives in time and
    /// `DestinationError::Disconnected` when the destination is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, DestinationError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => DestinationError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => DestinationError::Disconnected {
                destination: "notification_stream".to_string(),
            },
        })
    }

    /// Next buffered notification, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Takes every buffered notification.
    #[must_use]
    pub fn drain(&self) -> Vec<Notification> {
        self.rx.try_iter().collect()
    }

    /// Notifications the destination had to drop.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
