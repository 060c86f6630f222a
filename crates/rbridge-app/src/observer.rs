//! Consumer-side delivery of session notifications
//!
//! A consumer implements [`SessionObserver`] and drains the notification
//! channel on its own context with [`deliver`] (async) or
//! [`deliver_blocking`] (dedicated thread). Consumers running their own
//! select loop call [`dispatch`] per message instead.

use rbridge_core::prelude::*;
use rbridge_process::OutputSnapshot;

use crate::notifier::{Notification, NotificationReceiver};

/// Callbacks a consumer registers to follow a session
pub trait SessionObserver {
    /// New output is available; `snapshot` holds the full buffer contents.
    fn on_change(&mut self, snapshot: &OutputSnapshot);

    /// The session terminated. Called exactly once, after the last `on_change`.
    fn on_close(&mut self);
}

/// Observer built from two closures
pub struct Callbacks<C, D> {
    on_change: C,
    on_close: D,
}

impl<C, D> Callbacks<C, D>
where
    C: FnMut(&OutputSnapshot),
    D: FnMut(),
{
    pub fn new(on_change: C, on_close: D) -> Self {
        Self {
            on_change,
            on_close,
        }
    }
}

impl<C, D> SessionObserver for Callbacks<C, D>
where
    C: FnMut(&OutputSnapshot),
    D: FnMut(),
{
    fn on_change(&mut self, snapshot: &OutputSnapshot) {
        (self.on_change)(snapshot)
    }

    fn on_close(&mut self) {
        (self.on_close)()
    }
}

/// Whether delivery should continue after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Closed,
}

/// Run the observer callback for one notification
pub fn dispatch<O>(notification: Notification, observer: &mut O) -> Flow
where
    O: SessionObserver + ?Sized,
{
    match notification {
        Notification::Changed(snapshot) => {
            observer.on_change(&snapshot);
            Flow::Continue
        }
        Notification::Closed => {
            observer.on_close();
            Flow::Closed
        }
    }
}

/// Drain `rx` into `observer` until the session closes.
///
/// If the notifier goes away without sending `Closed`, `on_close` is still
/// called so the observer always sees exactly one close.
pub async fn deliver<O>(rx: &mut NotificationReceiver, observer: &mut O)
where
    O: SessionObserver + ?Sized,
{
    while let Some(notification) = rx.recv().await {
        if dispatch(notification, observer) == Flow::Closed {
            return;
        }
    }
    debug!("Notification channel closed without Closed message");
    observer.on_close();
}

/// Blocking variant of [`deliver`] for a dedicated OS thread.
///
/// Panics if called from within an async execution context.
pub fn deliver_blocking<O>(mut rx: NotificationReceiver, observer: &mut O)
where
    O: SessionObserver + ?Sized,
{
    while let Some(notification) = rx.blocking_recv() {
        if dispatch(notification, observer) == Flow::Closed {
            return;
        }
    }
    debug!("Notification channel closed without Closed message");
    observer.on_close();
}
