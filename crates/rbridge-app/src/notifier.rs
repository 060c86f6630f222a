//! Change notification for the output buffer
//!
//! The reader task appends to the buffer in many small chunks. Rather than
//! notifying per chunk, [`ChangeNotifier`] checks the buffer once per delay
//! and sends at most one [`Notification::Changed`] per tick, carrying the
//! cumulative content. Notifications go to a one-slot channel that the
//! consumer drains on its own context; see [`crate::observer`]. While the
//! slot is still occupied the notifier skips sending and offers the newest
//! snapshot on a later tick, so a slow consumer never has more than one
//! undelivered change waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use rbridge_core::prelude::*;
use rbridge_process::{OutputBuffer, OutputSnapshot};

/// Default coalescing delay
pub const DEFAULT_NOTIFY_DELAY: Duration = Duration::from_millis(10);

/// Undelivered notifications the channel holds
const NOTIFICATION_SLOTS: usize = 1;

/// Message sent from the notifier to the delivery context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Buffer content differs from the last delivered snapshot
    Changed(OutputSnapshot),
    /// The session has terminated; always the last message
    Closed,
}

/// Receiver side of a session's notifications
pub type NotificationReceiver = mpsc::Receiver<Notification>;

/// What the notifier last handed to the consumer
#[derive(Debug, Default)]
struct Delivered {
    /// Buffer revision last looked at
    seen_revision: u64,
    /// Stream position of the last delivered snapshot
    end: u64,
}

impl Delivered {
    /// Snapshot of the buffer if it moved past the last delivery.
    fn pending(&mut self, buffer: &OutputBuffer) -> Option<OutputSnapshot> {
        // Cheap check first: no append since the last look.
        if buffer.revision() == self.seen_revision {
            return None;
        }

        let snapshot = buffer.snapshot_with_position();
        if snapshot.end() == self.end {
            self.seen_revision = snapshot.revision();
            return None;
        }
        Some(snapshot)
    }

    /// Record a snapshot the consumer has been sent
    fn commit(&mut self, revision: u64, end: u64) {
        self.seen_revision = revision;
        self.end = end;
    }
}

/// Handle to a running notifier task
///
/// The task stops by itself after sending [`Notification::Closed`] or when
/// the receiving side is dropped.
#[derive(Debug)]
pub struct ChangeNotifier {
    task: JoinHandle<()>,
    delay: Duration,
}

impl ChangeNotifier {
    /// Start watching `buffer`, checking every `delay` until `terminated`
    /// turns true. Returns the handle and the consumer's receiver.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        buffer: Arc<OutputBuffer>,
        terminated: watch::Receiver<bool>,
        delay: Duration,
    ) -> Result<(Self, NotificationReceiver)> {
        if delay.is_zero() {
            return Err(Error::config_invalid("notifier delay must be greater than 0"));
        }

        let (tx, rx) = mpsc::channel(NOTIFICATION_SLOTS);

        // First check one full delay after spawn, so appends made right after
        // launch are coalesced with their successors.
        let start = Instant::now() + delay;
        let task = tokio::spawn(run(buffer, terminated, start, delay, tx));

        debug!("Change notifier started (delay {:?})", delay);
        Ok((Self { task, delay }, rx))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True once the task has delivered `Closed` or lost its receiver
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task without delivering `Closed`
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the task to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                warn!("Change notifier task failed: {}", e);
            }
        }
    }
}

async fn run(
    buffer: Arc<OutputBuffer>,
    mut terminated: watch::Receiver<bool>,
    start: Instant,
    delay: Duration,
    tx: mpsc::Sender<Notification>,
) {
    let mut ticker = tokio::time::interval_at(start, delay);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut delivered = Delivered::default();

    loop {
        tokio::select! {
            biased;

            _ = wait_terminated(&mut terminated) => {
                // Deliver whatever the reader appended before exit, then close.
                // Both wait for the slot; a stalled consumer delays them but
                // does not lose them.
                if let Some(snapshot) = delivered.pending(&buffer) {
                    let _ = tx.send(Notification::Changed(snapshot)).await;
                }
                if tx.send(Notification::Closed).await.is_err() {
                    debug!("Change notifier receiver gone before close");
                }
                debug!("Change notifier stopped: session closed");
                return;
            }

            _ = ticker.tick() => {
                if let Some(snapshot) = delivered.pending(&buffer) {
                    let (revision, end) = (snapshot.revision(), snapshot.end());
                    match tx.try_send(Notification::Changed(snapshot)) {
                        Ok(()) => {
                            trace!("Output changed: stream end {}", end);
                            delivered.commit(revision, end);
                        }
                        Err(TrySendError::Full(_)) => {
                            trace!("Consumer busy, holding change at stream end {}", end);
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("Change notifier stopped: receiver dropped");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Resolves when the flag turns true or its sender is gone.
async fn wait_terminated(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|flag| *flag).await;
}
