//! rbridge-app - Session orchestration for R Bridge
//!
//! Loads configuration, resolves which R to run, launches the session and
//! turns buffer changes into coalesced notifications for a consumer.

pub mod config;
pub mod discovery;
pub mod notifier;
pub mod observer;
pub mod session;

pub use config::Settings;
pub use discovery::{find_interpreter, find_interpreter_async, find_with, Lookup, LookupRequest};
pub use notifier::{ChangeNotifier, Notification, NotificationReceiver, DEFAULT_NOTIFY_DELAY};
pub use observer::{deliver, deliver_blocking, dispatch, Callbacks, Flow, SessionObserver};
pub use session::Session;
