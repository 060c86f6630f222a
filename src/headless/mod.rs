//! Headless mode - JSON event output instead of console text
//!
//! Outputs the session as NDJSON (newline-delimited JSON) on stdout, one
//! event per line, so scripts and editor integrations can drive R without
//! scraping prompts. Each event has an "event" field naming its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"interpreter_found","path":"/usr/lib/R/bin/R","platform":"unix","timestamp":1704700001000}
//! {"event":"session_started","pid":4242,"timestamp":1704700001050}
//! {"event":"output","text":"> ","end":2,"timestamp":1704700001100}
//! {"event":"session_closed","timestamp":1704700009000}
//! {"event":"exited","code":0,"timestamp":1704700009001}
//! ```

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use rbridge_app::SessionObserver;
use rbridge_process::OutputSnapshot;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Discovery picked an executable
    InterpreterFound {
        path: String,
        platform: String,
        timestamp: i64,
    },

    /// No usable executable was found
    InterpreterNotFound { searched: usize, timestamp: i64 },

    /// R was spawned
    SessionStarted { pid: Option<u32>, timestamp: i64 },

    /// Output appended since the previous output event
    Output {
        text: String,
        /// Stream position after `text`
        end: u64,
        timestamp: i64,
    },

    /// The session terminated; no more output follows
    SessionClosed { timestamp: i64 },

    /// R's exit status, `null` when killed by a signal
    Exited { code: Option<i32>, timestamp: i64 },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_to(&mut stdout) {
            error!("Failed to write headless event to stdout: {}", e);
        }
    }

    /// Write this event as one NDJSON line and flush
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let json = serde_json::to_string(self).map_err(io::Error::other)?;
        writeln!(out, "{}", json)?;
        out.flush()
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn interpreter_found(path: &std::path::Path, platform: &str) -> Self {
        Self::InterpreterFound {
            path: path.display().to_string(),
            platform: platform.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn interpreter_not_found(searched: usize) -> Self {
        Self::InterpreterNotFound {
            searched,
            timestamp: Self::now(),
        }
    }

    pub fn session_started(pid: Option<u32>) -> Self {
        Self::SessionStarted {
            pid,
            timestamp: Self::now(),
        }
    }

    pub fn output(text: String, end: u64) -> Self {
        Self::Output {
            text,
            end,
            timestamp: Self::now(),
        }
    }

    pub fn session_closed() -> Self {
        Self::SessionClosed {
            timestamp: Self::now(),
        }
    }

    pub fn exited(code: Option<i32>) -> Self {
        Self::Exited {
            code,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}

/// Observer that turns buffer changes into `output` events
///
/// Each event is a blocking write to `out`; `run` drives it through
/// [`crate::render_on_thread`].
pub struct HeadlessView<W: Write> {
    out: W,
    /// Stream position already emitted
    emitted_end: u64,
}

impl HeadlessView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> HeadlessView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            emitted_end: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, event: HeadlessEvent) {
        if let Err(e) = event.write_to(&mut self.out) {
            error!("Failed to write headless event: {}", e);
        }
    }
}

impl<W: Write> SessionObserver for HeadlessView<W> {
    fn on_change(&mut self, snapshot: &OutputSnapshot) {
        let text = snapshot.new_since(self.emitted_end).to_string();
        self.emitted_end = snapshot.end();
        if !text.is_empty() {
            self.write(HeadlessEvent::output(text, snapshot.end()));
        }
    }

    fn on_close(&mut self) {
        self.write(HeadlessEvent::session_closed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbridge_process::OutputBuffer;

    fn lines(bytes: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("invalid JSON"))
            .collect()
    }

    #[test]
    fn test_interpreter_found_serialization() {
        let event = HeadlessEvent::interpreter_found(std::path::Path::new("/usr/bin/R"), "unix");
        let json = serde_json::to_string(&event).expect("serialization failed");
        let value: serde_json::Value = serde_json::from_str(&json).expect("invalid JSON");

        assert_eq!(value["event"], "interpreter_found");
        assert_eq!(value["path"], "/usr/bin/R");
        assert_eq!(value["platform"], "unix");
        assert!(value["timestamp"].is_number());
    }

    #[test]
    fn test_exited_with_signal_serializes_null() {
        let event = HeadlessEvent::exited(None);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "exited");
        assert!(value["code"].is_null());
    }

    #[test]
    fn test_error_serialization() {
        let event = HeadlessEvent::error("R not found".to_string(), true);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "error");
        assert_eq!(value["message"], "R not found");
        assert_eq!(value["fatal"], true);
    }

    #[test]
    fn test_view_emits_only_new_output() {
        let buffer = OutputBuffer::new(100).unwrap();
        let mut view = HeadlessView::new(Vec::new());

        buffer.append("> ");
        view.on_change(&buffer.snapshot_with_position());
        buffer.append("1+1\n[1] 2\n");
        view.on_change(&buffer.snapshot_with_position());
        view.on_close();

        let events = lines(&view.into_inner());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "output");
        assert_eq!(events[0]["text"], "> ");
        assert_eq!(events[1]["text"], "1+1\n[1] 2\n");
        assert_eq!(events[1]["end"], 12);
        assert_eq!(events[2]["event"], "session_closed");
    }

    #[test]
    fn test_view_after_eviction_emits_what_is_left() {
        let buffer = OutputBuffer::new(4).unwrap();
        let mut view = HeadlessView::new(Vec::new());

        buffer.append("abcdefgh");
        view.on_change(&buffer.snapshot_with_position());

        let events = lines(&view.into_inner());
        assert_eq!(events[0]["text"], "efgh");
        assert_eq!(events[0]["end"], 8);
    }
}
