// SPDX-License-Identifier: MPL-2.0
//! Lifecycle notifications and their delivery to the host.
//!
//! The decode thread hands every notification to a [`NotificationChannel`],
//! which forwards it to each registered handler in registration order.
//! Delivery is fire-and-forget. A callback that panics is caught and
//! logged and stays registered; a queue whose receiver has been dropped is
//! removed. Either way the decode loop carries on.
//!
//! Two kinds of handler exist:
//! - callbacks registered with [`NotificationChannel::subscribe`], invoked
//!   directly on the decode thread (keep them short, post to your own
//!   event loop from there);
//! - queues created with [`NotificationChannel::channel`], an unbounded
//!   tokio receiver the host drains on the thread of its choice.
//!
//! Handlers must not call `subscribe`/`unsubscribe` on the same channel
//! from inside a callback.

use crate::domain::video::{FrameSnapshot, VideoInfo};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Why a playback session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The source ran out of frames.
    EndOfStream,
    /// The source failed mid-stream; the session ended as if the stream
    /// had finished.
    DecodeError(String),
    /// `stop()` (or `load()`, or dropping the engine) ended the session.
    Stopped,
}

/// Event emitted by the playback engine.
///
/// Within a session `FrameReady` indices strictly increase, except across a
/// seek where the index jumps to `frame_rate_hz * target` (and may go
/// backwards).
#[derive(Debug, Clone)]
pub enum Notification {
    /// A source was opened and a session started.
    Loaded(VideoInfo),
    /// The stream duration, in seconds. Skipped when the container does
    /// not report one.
    DurationKnown(f64),
    /// A new frame is current.
    FrameReady(FrameSnapshot),
    /// `frame_index` reached a whole multiple of the frame rate.
    SecondElapsed { second: u64, frame_index: u64 },
    /// The session is over; resources have been released.
    Ended(EndReason),
}

impl Notification {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Loaded(_) => "loaded",
            Self::DurationKnown(_) => "duration_known",
            Self::FrameReady(_) => "frame_ready",
            Self::SecondElapsed { .. } => "second_elapsed",
            Self::Ended(_) => "ended",
        }
    }
}

/// Identifies a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&Notification) + Send>;

enum Handler {
    Callback(Callback),
    Queue(UnboundedSender<Notification>),
}

impl Handler {
    /// Delivers one notification. Returns false when the handler is gone
    /// and should be removed.
    fn deliver(&mut self, notification: &Notification) -> bool {
        match self {
            Self::Callback(callback) => {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(notification))).is_err() {
                    log::warn!("notification callback panicked on {}", notification.kind());
                }
                true
            }
            Self::Queue(sender) => sender.send(notification.clone()).is_ok(),
        }
    }
}

/// Ordered list of handlers shared between host and decode thread.
#[derive(Default)]
pub struct NotificationChannel {
    handlers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("handlers", &self.len())
            .finish()
    }
}

impl NotificationChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback invoked on the decode thread.
    ///
    /// A panic inside the callback is caught and logged; the callback keeps
    /// receiving later notifications.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.register(Handler::Callback(Box::new(callback)))
    }

    /// Registers a queue and returns its receiving end.
    ///
    /// Dropping the receiver unregisters the queue on the next emit.
    pub fn channel(&self) -> (SubscriptionId, UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (self.register(Handler::Queue(sender)), receiver)
    }

    /// Removes a handler. Returns false if it was not registered (or has
    /// already been dropped).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .lock()
            .map(|handlers| handlers.len())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `notification` to every handler, dropping dead ones.
    pub fn emit(&self, notification: &Notification) {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.retain_mut(|(id, handler)| {
            let alive = handler.deliver(notification);
            if !alive {
                log::trace!(
                    "dropping notification handler {:?} after failed {} delivery",
                    id,
                    notification.kind()
                );
            }
            alive
        });
    }

    fn register(&self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ended() -> Notification {
        Notification::Ended(EndReason::EndOfStream)
    }

    #[test]
    fn callbacks_receive_notifications_in_order() {
        let channel = NotificationChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.subscribe(move |n| sink.lock().unwrap().push(n.kind()));

        channel.emit(&Notification::DurationKnown(2.0));
        channel.emit(&ended());

        assert_eq!(*seen.lock().unwrap(), vec!["duration_known", "ended"]);
    }

    #[test]
    fn panicking_callback_stays_subscribed() {
        let channel = NotificationChannel::new();
        let count = Arc::new(AtomicU64::new(0));
        let attempts = Arc::new(AtomicU64::new(0));
        let tries = Arc::clone(&attempts);
        channel.subscribe(move |_| {
            if tries.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("host window busy");
            }
        });
        let counter = Arc::clone(&count);
        channel.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        channel.emit(&ended());
        channel.emit(&ended());

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn closed_queue_is_pruned() {
        let channel = NotificationChannel::new();
        let (_, receiver) = channel.channel();
        assert_eq!(channel.len(), 1);
        drop(receiver);
        channel.emit(&ended());
        assert!(channel.is_empty());
    }

    #[test]
    fn unsubscribe_removes_handler_once() {
        let channel = NotificationChannel::new();
        let id = channel.subscribe(|_| {});
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
    }

    #[tokio::test]
    async fn queue_delivers_to_async_receiver() {
        let channel = NotificationChannel::new();
        let (_, mut receiver) = channel.channel();
        channel.emit(&Notification::SecondElapsed {
            second: 1,
            frame_index: 30,
        });
        match receiver.recv().await {
            Some(Notification::SecondElapsed {
                second,
                frame_index,
            }) => {
                assert_eq!(second, 1);
                assert_eq!(frame_index, 30);
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }
}
